// Entry point for the ledger CLI
use clap::Parser;
use data_encoding::HEXLOWER;
use log::{error, LevelFilter};
use std::process;
use utxo_ledger::{
    address_to_pub_key_hash, convert_address, hash_pub_key, Command, Ledger, Opt, SledStorage,
    Wallets, GLOBAL_CONFIG,
};

fn main() {
    // Info level by default; RUST_LOG still overrides it
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();

    // Any failure is logged and the process exits with code 1
    if let Err(e) = run_command(opt.command) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn open_storage() -> utxo_ledger::Result<SledStorage> {
    SledStorage::open(GLOBAL_CONFIG.get_data_dir())
}

fn run_command(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        // The genesis block pays the first subsidy to this address
        Command::Createblockchain { address } => {
            Ledger::create(open_storage()?, &address)?;
            println!("Done!");
        }
        Command::Createwallet => {
            let mut wallets = Wallets::load(GLOBAL_CONFIG.get_wallet_file())?;
            let address = wallets.create_wallet()?;
            println!("Your new address: {address}")
        }
        // Balance is the sum of the address's unspent outputs
        Command::GetBalance { address } => {
            let pub_key_hash = address_to_pub_key_hash(&address)?;
            let ledger = Ledger::open(open_storage()?)?;
            let balance = ledger.get_balance(&pub_key_hash)?;
            println!("Balance of {address}: {balance}");
        }
        Command::ListAddresses => {
            let wallets = Wallets::load(GLOBAL_CONFIG.get_wallet_file())?;
            for address in wallets.get_addresses() {
                println!("{address}")
            }
        }
        // The payment and a mining reward for the sender go into one new block
        Command::Send { from, to, amount } => {
            let wallets = Wallets::load(GLOBAL_CONFIG.get_wallet_file())?;
            let mut ledger = Ledger::open(open_storage()?)?;
            ledger.send(&from, &to, amount, &wallets)?;
            println!("Success!")
        }
        // Newest block first
        Command::Printchain => {
            let ledger = Ledger::open(open_storage()?)?;
            for summary in ledger.list_blocks()? {
                let block = &summary.block;
                let pre_block_hash = HEXLOWER.encode(block.get_pre_block_hash());
                println!("Pre block hash: {pre_block_hash}");
                println!("Cur block hash: {}", HEXLOWER.encode(block.get_hash()));
                println!("Cur block Timestamp: {}", block.get_timestamp());
                println!("Nonce: {}", block.get_nonce());
                println!("PoW: {}", summary.pow_valid);

                for tx in block.get_transactions() {
                    let cur_txid_hex = HEXLOWER.encode(tx.get_id());
                    println!("- Transaction txid_hex: {cur_txid_hex}");

                    if !tx.is_coinbase() {
                        for input in tx.get_vin() {
                            let txid_hex = HEXLOWER.encode(input.get_txid());
                            let pub_key_hash = hash_pub_key(input.get_pub_key());
                            let address = convert_address(pub_key_hash.as_slice());
                            println!(
                                "-- Input txid = {}, vout = {}, from = {}",
                                txid_hex,
                                input.get_vout(),
                                address,
                            )
                        }
                    }
                    for output in tx.get_vout() {
                        let address = convert_address(output.get_pub_key_hash());
                        println!("-- Output value = {}, to = {}", output.get_value(), address)
                    }
                }
                println!()
            }
        }
        Command::Verifychain => {
            let ledger = Ledger::open(open_storage()?)?;
            if !ledger.verify_chain()? {
                return Err("Chain verification failed".into());
            }
            println!("Chain is valid");
        }
    }
    Ok(())
}
