use std::{
    io::{self, Write},
    path::PathBuf,
};

use clap::{Parser, Subcommand};
use tally::{
    config::CartConfig,
    logging::LoggingConfig,
    service::CartService,
    storage::FileStore,
};

mod cart;
mod checkout;

#[derive(Debug, Parser)]
#[command(name = "tally", about = "Cart pricing and state CLI", long_about = None)]
pub(crate) struct Cli {
    /// Directory holding the stored cart and checkout sessions
    #[arg(long, env = "TALLY_STORE", default_value = ".tally", global = true)]
    store: PathBuf,

    /// YAML configuration file; built-in defaults when omitted
    #[arg(long, env = "TALLY_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    logging: LoggingConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the cart and its totals
    Show(cart::ShowArgs),
    /// Add a plan to the cart
    Add(cart::AddArgs),
    /// Remove a line
    Remove(cart::RemoveArgs),
    /// Set a line's quantity; zero or less removes it
    Update(cart::UpdateArgs),
    /// Apply a coupon code
    Coupon(cart::CouponArgs),
    /// Remove the applied coupon
    Uncoupon,
    /// Change the cart currency
    Currency(cart::CurrencyArgs),
    /// Drop the cart
    Clear,
    /// Open a checkout session for the cart
    Checkout(checkout::CheckoutArgs),
    /// Mark a checkout session paid
    Complete(checkout::CompleteArgs),
}

impl Cli {
    pub(crate) fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    pub(crate) fn run(self) -> Result<(), String> {
        let config = match &self.config {
            Some(path) => CartConfig::from_path(path)
                .map_err(|error| format!("failed to load {}: {error}", path.display()))?,
            None => CartConfig::default(),
        };

        let mut service = CartService::new(FileStore::new(self.store), config);

        match self.command {
            Commands::Show(args) => cart::show(&service, &args),
            Commands::Add(args) => cart::add(&mut service, args),
            Commands::Remove(args) => cart::remove(&mut service, &args),
            Commands::Update(args) => cart::update(&mut service, &args),
            Commands::Coupon(args) => cart::apply_coupon(&mut service, &args),
            Commands::Uncoupon => cart::remove_coupon(&mut service),
            Commands::Currency(args) => cart::set_currency(&mut service, &args),
            Commands::Clear => cart::clear(&mut service),
            Commands::Checkout(args) => checkout::open(&mut service, args),
            Commands::Complete(args) => checkout::complete(&mut service, &args),
        }
    }
}

type Service = CartService<FileStore>;

fn print_line(line: &str) -> Result<(), String> {
    writeln!(io::stdout().lock(), "{line}").map_err(|error| error.to_string())
}
