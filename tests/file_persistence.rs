//! Carts stored on disk survive a restart, and unusable blobs are discarded.

use std::fs;

use rust_decimal_macros::dec;
use testresult::TestResult;

use tally::prelude::*;

fn essential() -> CartItem {
    CartItem::new("plan-1", "essential", "Essential Plan", 3_000, Currency::Brl)
}

fn start() -> CartItem {
    CartItem::new("plan-2", "start", "Start Plan", 1_500, Currency::Brl)
        .with_quantity(2)
        .with_discount(ItemDiscount::percentage(dec!(10)))
}

#[test]
fn cart_survives_restart() -> TestResult {
    let tmp = tempfile::tempdir()?;

    let mut service = CartService::new(FileStore::new(tmp.path()), CartConfig::default());
    service.add_item(essential())?;
    service.add_item(start())?;
    service.apply_coupon("WELCOME10")?;
    let before = service.summary()?;

    let service = CartService::new(FileStore::new(tmp.path()), CartConfig::default());

    assert_eq!(service.summary()?, before);
    assert_eq!(before.subtotal, 6_000);
    assert_eq!(before.discount, 900);
    assert_eq!(before.total, 5_100);
    assert_eq!(
        service
            .current_cart()
            .and_then(Cart::coupon)
            .map(|coupon| coupon.code.as_str()),
        Some("WELCOME10")
    );

    Ok(())
}

#[test]
fn blob_lives_under_configured_key() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let config = CartConfig::from_yaml_str("storage_key: shop_cart\n")?;

    let mut service = CartService::new(FileStore::new(tmp.path()), config);
    service.add_item(essential())?;

    assert!(tmp.path().join("shop_cart.json").exists());
    assert!(!tmp.path().join("xperience_cart.json").exists());

    Ok(())
}

#[test]
fn corrupt_blob_is_removed_on_start() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("xperience_cart.json");
    fs::write(&path, "{ not json")?;

    let service = CartService::new(FileStore::new(tmp.path()), CartConfig::default());

    assert!(service.current_cart().is_none());
    assert_eq!(service.summary()?, CartSummary::empty(Currency::Brl));
    assert!(!path.exists());

    Ok(())
}

#[test]
fn structurally_valid_but_mixed_currency_blob_is_removed() -> TestResult {
    let tmp = tempfile::tempdir()?;

    let mut service = CartService::new(FileStore::new(tmp.path()), CartConfig::default());
    service.add_item(essential())?;

    let path = tmp.path().join("xperience_cart.json");
    let tampered = fs::read_to_string(&path)?.replace(
        r#""currency":"BRL","quantity""#,
        r#""currency":"USD","quantity""#,
    );
    fs::write(&path, tampered)?;

    let service = CartService::new(FileStore::new(tmp.path()), CartConfig::default());

    assert!(service.current_cart().is_none());
    assert!(!path.exists());

    Ok(())
}

#[test]
fn stale_totals_are_recomputed_on_load() -> TestResult {
    let tmp = tempfile::tempdir()?;

    let mut service = CartService::new(FileStore::new(tmp.path()), CartConfig::default());
    service.add_item(essential())?;

    let path = tmp.path().join("xperience_cart.json");
    let tampered = fs::read_to_string(&path)?.replace(r#""total":3000"#, r#""total":1"#);
    fs::write(&path, tampered)?;

    let service = CartService::new(FileStore::new(tmp.path()), CartConfig::default());

    assert_eq!(service.current_cart().map(Cart::total), Some(3_000));

    Ok(())
}

#[test]
fn clear_deletes_file() -> TestResult {
    let tmp = tempfile::tempdir()?;

    let mut service = CartService::new(FileStore::new(tmp.path()), CartConfig::default());
    service.add_item(essential())?;
    service.clear_cart();

    assert!(!tmp.path().join("xperience_cart.json").exists());

    let service = CartService::new(FileStore::new(tmp.path()), CartConfig::default());

    assert!(!service.has_items());

    Ok(())
}

#[test]
fn config_file_drives_tax_and_coupons() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let config_path = tmp.path().join("tally.yml");

    fs::write(
        &config_path,
        r#"
tax_rate: 10
coupons:
  - code: LAUNCH
    type: fixed
    value: 1000
    validFrom: "2020-01-01T00:00:00Z"
    validTo: "2099-01-01T00:00:00Z"
"#,
    )?;

    let config = CartConfig::from_path(&config_path)?;
    let mut service = CartService::new(FileStore::new(tmp.path().join("store")), config);

    service.add_item(essential())?;
    service.apply_coupon("launch")?;

    let summary = service.summary()?;

    // 3000 - 1000, then 10% tax
    assert_eq!(summary.discount, 1_000);
    assert_eq!(summary.tax, 200);
    assert_eq!(summary.total, 2_200);

    assert!(matches!(
        service.apply_coupon("WELCOME10"),
        Err(CartError::Coupon(CouponError::Unknown(_)))
    ));

    Ok(())
}

#[test]
fn reload_prices_with_current_config() -> TestResult {
    let tmp = tempfile::tempdir()?;

    let mut service = CartService::new(FileStore::new(tmp.path()), CartConfig::default());
    service.add_item(essential())?;
    service.apply_coupon("WELCOME10")?;

    let path = tmp.path().join("xperience_cart.json");
    let tampered = fs::read_to_string(&path)?.replace(r#""taxRate":"0""#, r#""taxRate":"-300""#);
    fs::write(&path, tampered)?;

    let config = CartConfig::from_yaml_str("tax_rate: 10\n")?;
    let service = CartService::new(FileStore::new(tmp.path()), config);
    let summary = service.summary()?;

    // 3000 - 300, then 10% tax
    assert_eq!(summary.discount, 300);
    assert_eq!(summary.tax, 270);
    assert_eq!(summary.total, 2_970);

    Ok(())
}
