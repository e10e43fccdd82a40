use std::io;

use clap::Args;
use rust_decimal::Decimal;
use tally::{currency::Currency, discounts::ItemDiscount, items::CartItem, receipt::Receipt};

use super::{Service, print_line};

#[derive(Debug, Args)]
pub(crate) struct ShowArgs {
    /// Print the stored cart as JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
pub(crate) struct AddArgs {
    /// Plan identifier; lines for the same plan are merged
    plan_id: String,

    /// Display name
    #[arg(long)]
    name: String,

    /// Unit price in minor units
    #[arg(long)]
    price: i64,

    /// Price currency; the configured default when omitted
    #[arg(long)]
    currency: Option<Currency>,

    /// Units to add
    #[arg(long, default_value_t = 1)]
    quantity: u32,

    /// Line id; the plan id when omitted
    #[arg(long)]
    id: Option<String>,

    /// Short description
    #[arg(long, default_value = "")]
    description: String,

    /// Plan length in months
    #[arg(long, default_value_t = 1)]
    duration_months: u32,

    /// Feature bullet point; repeat for more
    #[arg(long = "feature")]
    features: Vec<String>,

    /// Percentage off each unit, in percent points
    #[arg(long, conflicts_with = "discount_fixed")]
    discount_percent: Option<Decimal>,

    /// Fixed amount off each unit, in minor units
    #[arg(long)]
    discount_fixed: Option<i64>,
}

#[derive(Debug, Args)]
pub(crate) struct RemoveArgs {
    /// Line id
    id: String,
}

#[derive(Debug, Args)]
pub(crate) struct UpdateArgs {
    /// Line id
    id: String,

    /// New quantity
    #[arg(allow_negative_numbers = true)]
    quantity: i64,
}

#[derive(Debug, Args)]
pub(crate) struct CouponArgs {
    /// Coupon code, case-insensitive
    code: String,
}

#[derive(Debug, Args)]
pub(crate) struct CurrencyArgs {
    /// ISO code: BRL, USD, BTC or USDT
    currency: Currency,
}

pub(crate) fn show(service: &Service, args: &ShowArgs) -> Result<(), String> {
    let Some(cart) = service.current_cart() else {
        return print_line("No cart");
    };

    if args.json {
        let json = serde_json::to_string_pretty(cart).map_err(|error| error.to_string())?;
        return print_line(&json);
    }

    Receipt::from_cart(cart)
        .and_then(|receipt| receipt.write_to(io::stdout().lock()))
        .map_err(|error| error.to_string())
}

pub(crate) fn add(service: &mut Service, args: AddArgs) -> Result<(), String> {
    let currency = args
        .currency
        .unwrap_or(service.config().default_currency);

    let id = args.id.unwrap_or_else(|| args.plan_id.clone());

    let mut item = CartItem::new(id, args.plan_id, args.name, args.price, currency)
        .with_quantity(args.quantity);

    item.description = args.description;
    item.duration_months = args.duration_months;
    item.features = args.features;

    if let Some(points) = args.discount_percent {
        item = item.with_discount(ItemDiscount::percentage(points));
    } else if let Some(amount) = args.discount_fixed {
        item = item.with_discount(ItemDiscount::fixed(amount));
    }

    let line = service.add_item(item).map_err(|error| error.to_string())?;

    print_line(&format!("{} x {} ({})", line.quantity, line.name, line.id))?;
    print_totals(service)
}

pub(crate) fn remove(service: &mut Service, args: &RemoveArgs) -> Result<(), String> {
    let removed = service
        .remove_item(&args.id)
        .map_err(|error| error.to_string())?;

    print_line(&format!("removed {}", removed.name))?;
    print_totals(service)
}

pub(crate) fn update(service: &mut Service, args: &UpdateArgs) -> Result<(), String> {
    match service
        .update_quantity(&args.id, args.quantity)
        .map_err(|error| error.to_string())?
    {
        Some(line) => print_line(&format!("{} x {}", line.quantity, line.name))?,
        None => print_line(&format!("removed {}", args.id))?,
    }

    print_totals(service)
}

pub(crate) fn apply_coupon(service: &mut Service, args: &CouponArgs) -> Result<(), String> {
    let coupon = service
        .apply_coupon(&args.code)
        .map_err(|error| error.to_string())?;

    print_line(&format!("applied {}", coupon.code))?;
    print_totals(service)
}

pub(crate) fn remove_coupon(service: &mut Service) -> Result<(), String> {
    match service.remove_coupon().map_err(|error| error.to_string())? {
        Some(coupon) => print_line(&format!("removed {}", coupon.code))?,
        None => print_line("no coupon applied")?,
    }

    print_totals(service)
}

pub(crate) fn set_currency(service: &mut Service, args: &CurrencyArgs) -> Result<(), String> {
    service
        .set_currency(args.currency)
        .map_err(|error| error.to_string())?;

    print_line(&format!("currency {}", args.currency))
}

pub(crate) fn clear(service: &mut Service) -> Result<(), String> {
    service.clear_cart();

    print_line("cart cleared")
}

fn print_totals(service: &Service) -> Result<(), String> {
    let summary = service.summary().map_err(|error| error.to_string())?;
    let currency = summary.currency;

    print_line(&format!(
        "{} items, subtotal {}, discount {}, total {}",
        summary.item_count,
        currency.format(summary.subtotal),
        currency.format(summary.discount),
        currency.format(summary.total),
    ))
}
