//! Receipt

use std::{fmt::Write, io};

use decimal_percentage::Percentage;
use rust_decimal::Decimal;
use tabled::{
    builder::Builder,
    grid::config::HorizontalLine,
    settings::{
        Alignment, Color, Style, Theme,
        object::{Columns, Rows},
    },
};
use thiserror::Error;

use crate::{
    cart::Cart,
    discounts::DiscountError,
    items::CartItem,
    pricing::{CartSummary, PricingError},
};

/// Errors that can occur when rendering a receipt.
#[derive(Debug, Error)]
pub enum ReceiptError {
    /// The cart could not be priced.
    #[error(transparent)]
    Pricing(#[from] PricingError),

    /// A line discount could not be computed.
    #[error(transparent)]
    Discount(#[from] DiscountError),

    /// The output could not be written.
    #[error("IO error: {0}")]
    IO(#[from] io::Error),
}

/// Printable view of a cart and its totals.
#[derive(Debug, Clone)]
pub struct Receipt<'a> {
    cart: &'a Cart,
    summary: CartSummary,
}

impl<'a> Receipt<'a> {
    /// Price `cart` and build a receipt for it.
    ///
    /// # Errors
    ///
    /// Returns a [`ReceiptError`] if the cart cannot be priced.
    pub fn from_cart(cart: &'a Cart) -> Result<Self, ReceiptError> {
        Ok(Self {
            cart,
            summary: cart.summary()?,
        })
    }

    /// Totals shown at the foot of the receipt.
    pub fn summary(&self) -> &CartSummary {
        &self.summary
    }

    /// Savings as a share of the subtotal.
    pub fn savings_percent(&self) -> Percentage {
        if self.summary.subtotal == 0 {
            return Percentage::from(Decimal::ZERO);
        }

        Percentage::from(Decimal::from(self.summary.savings) / Decimal::from(self.summary.subtotal))
    }

    /// Writes the receipt table and summary.
    ///
    /// # Errors
    ///
    /// Returns an error if a line cannot be priced or the output cannot be written.
    pub fn write_to(&self, mut out: impl io::Write) -> Result<(), ReceiptError> {
        if self.cart.is_empty() {
            writeln!(out, "\nCart is empty\n")?;

            return Ok(());
        }

        let mut builder = Builder::default();

        builder.push_record(["", "Plan", "Unit Price", "Qty", "Line Total", "Discount"]);

        for (idx, item) in self.cart.items().iter().enumerate() {
            builder.push_record(self.item_row(idx, item)?);
        }

        write_receipt_table(&mut out, builder)?;
        write_receipt_summary(&mut out, self)
    }

    fn item_row(&self, idx: usize, item: &CartItem) -> Result<[String; 6], ReceiptError> {
        let currency = self.summary.currency;
        let line_total = item.line_total().ok_or(PricingError::Overflow)?;
        let discount = item.line_discount()?;

        let discount_cell = if discount == 0 {
            String::new()
        } else {
            format!("-{}", currency.format(discount))
        };

        Ok([
            format!("#{:<3}", idx + 1),
            item.name.clone(),
            currency.format(item.price),
            item.quantity.to_string(),
            currency.format(line_total),
            discount_cell,
        ])
    }
}

fn write_receipt_table(out: &mut impl io::Write, builder: Builder) -> Result<(), ReceiptError> {
    let mut table = builder.build();
    let mut theme = Theme::from(Style::modern_rounded());
    let separator = HorizontalLine::new(Some('─'), Some('┼'), Some('├'), Some('┤'));

    theme.remove_horizontal_lines();
    theme.insert_horizontal_line(1, separator);

    table.with(theme);
    table.modify(Rows::first(), Color::BOLD);
    table.modify(Columns::new(2..6), Alignment::right());
    table.modify(Columns::new(5..6), Color::FG_GREEN);

    let table_str = colorize_borders(&table.to_string());

    writeln!(out, "\n{table_str}")?;

    Ok(())
}

fn write_receipt_summary(
    out: &mut impl io::Write,
    receipt: &Receipt<'_>,
) -> Result<(), ReceiptError> {
    let summary = receipt.summary();
    let currency = summary.currency;
    let savings_points = percent_points_from_fractional_percentage(receipt.savings_percent());

    let mut lines = vec![
        (" Subtotal:".to_string(), format!("{}  ", currency.format(summary.subtotal))),
    ];

    if let Some(coupon) = receipt.cart.coupon() {
        lines.push((" Coupon:".to_string(), format!("{}  ", coupon.code)));
    }

    lines.push((
        " Discount:".to_string(),
        format!("-{}  ", currency.format(summary.discount)),
    ));

    if summary.tax != 0 {
        lines.push((" Tax:".to_string(), format!("{}  ", currency.format(summary.tax))));
    }

    lines.push((
        " \x1b[1mTotal:\x1b[0m".to_string(),
        format!("\x1b[1m{}  \x1b[0m", currency.format(summary.total)),
    ));
    lines.push((
        " Savings:".to_string(),
        format!("({savings_points:.2}%) {}  ", currency.format(summary.savings)),
    ));

    let label_width = lines
        .iter()
        .map(|(label, _)| visible_width(label))
        .max()
        .unwrap_or_default();

    let value_width = lines
        .iter()
        .map(|(_, value)| visible_width(value))
        .max()
        .unwrap_or_default();

    for (label, value) in &lines {
        write_summary_line(out, label, value, label_width, value_width)?;
    }

    writeln!(out)?;

    Ok(())
}

/// Converts a fractional percentage to percent points for display.
fn percent_points_from_fractional_percentage(percentage: Percentage) -> Decimal {
    ((percentage * Decimal::ONE) * Decimal::ONE_HUNDRED).round_dp(2)
}

/// Wraps runs of box-drawing characters in ANSI dark-grey escape codes.
fn colorize_borders(table: &str) -> String {
    let mut out = String::with_capacity(table.len() + 256);
    let mut in_run = false;

    for ch in table.chars() {
        let box_char = ('\u{2500}'..='\u{257F}').contains(&ch);

        if box_char && !in_run {
            _ = out.write_str("\x1b[90m");
            in_run = true;
        } else if !box_char && in_run {
            _ = out.write_str("\x1b[0m");
            in_run = false;
        }

        out.push(ch);
    }

    if in_run {
        _ = out.write_str("\x1b[0m");
    }

    out
}

/// Returns the visible (non-ANSI) width of a string.
fn visible_width(s: &str) -> usize {
    let mut width = 0usize;
    let mut in_escape = false;

    for ch in s.chars() {
        if in_escape {
            if ch.is_ascii_alphabetic() {
                in_escape = false;
            }
        } else if ch == '\x1b' {
            in_escape = true;
        } else {
            width += 1;
        }
    }

    width
}

fn write_summary_line(
    out: &mut impl io::Write,
    label: &str,
    value: &str,
    label_col_width: usize,
    value_col_width: usize,
) -> Result<(), ReceiptError> {
    let label_pad = label_col_width.saturating_sub(visible_width(label));
    let value_pad = value_col_width.saturating_sub(visible_width(value));

    writeln!(
        out,
        "{:>label_pad$}{label}  {value_pad}{value}",
        "",
        value_pad = " ".repeat(value_pad)
    )?;

    Ok(())
}
