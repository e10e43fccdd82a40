//! Currencies

use std::{fmt, str::FromStr};

use rust_decimal::Decimal;
use rusty_money::{Money, iso};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while parsing a currency code.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CurrencyError {
    /// The code is not one of the supported currencies.
    #[error("Unknown currency code: {0}")]
    UnknownCode(String),
}

/// Currencies a cart can be priced in.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Brazilian real
    #[default]
    Brl,

    /// United States dollar
    Usd,

    /// Bitcoin, counted in satoshis
    Btc,

    /// Tether
    Usdt,
}

impl Currency {
    /// Every supported currency.
    pub const ALL: [Currency; 4] = [Currency::Brl, Currency::Usd, Currency::Btc, Currency::Usdt];

    /// Upper-case code for the currency.
    pub fn code(self) -> &'static str {
        match self {
            Currency::Brl => "BRL",
            Currency::Usd => "USD",
            Currency::Btc => "BTC",
            Currency::Usdt => "USDT",
        }
    }

    /// Number of decimal places in one major unit.
    pub fn exponent(self) -> u32 {
        match self {
            Currency::Btc => 8,
            Currency::Brl | Currency::Usd | Currency::Usdt => 2,
        }
    }

    /// The ISO 4217 definition, for fiat currencies only.
    pub fn iso(self) -> Option<&'static iso::Currency> {
        match self {
            Currency::Brl => Some(iso::BRL),
            Currency::Usd => Some(iso::USD),
            Currency::Btc | Currency::Usdt => None,
        }
    }

    /// Converts an amount in minor units into major units.
    pub fn to_major(self, minor: i64) -> Decimal {
        Decimal::new(minor, self.exponent())
    }

    /// Formats an amount in minor units for display.
    pub fn format(self, minor: i64) -> String {
        if let Some(iso) = self.iso() {
            return Money::from_minor(minor, iso).to_string();
        }

        let major = self.to_major(minor);

        match self {
            Currency::Btc => format!("₿ {major:.8}"),
            _ => format!("{major:.2} {}", self.code()),
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = CurrencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();

        Currency::ALL
            .into_iter()
            .find(|currency| currency.code() == code)
            .ok_or_else(|| CurrencyError::UnknownCode(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn parses_codes_case_insensitively() -> TestResult {
        assert_eq!("brl".parse::<Currency>()?, Currency::Brl);
        assert_eq!(" USDT ".parse::<Currency>()?, Currency::Usdt);
        assert_eq!("Btc".parse::<Currency>()?, Currency::Btc);

        Ok(())
    }

    #[test]
    fn unknown_code_errors() {
        assert_eq!(
            "EUR".parse::<Currency>(),
            Err(CurrencyError::UnknownCode("EUR".to_string()))
        );
    }

    #[test]
    fn default_is_brl() {
        assert_eq!(Currency::default(), Currency::Brl);
    }

    #[test]
    fn fiat_formats_through_iso_definition() {
        assert_eq!(Currency::Usd.format(300_050), "$3,000.50");
    }

    #[test]
    fn crypto_formats_with_own_precision() {
        assert_eq!(Currency::Btc.format(12_345), "₿ 0.00012345");
        assert_eq!(Currency::Usdt.format(1_999), "19.99 USDT");
    }

    #[test]
    fn serializes_as_upper_case_code() -> TestResult {
        assert_eq!(serde_json::to_string(&Currency::Usdt)?, "\"USDT\"");
        assert_eq!(serde_json::from_str::<Currency>("\"BRL\"")?, Currency::Brl);

        Ok(())
    }
}
