//! Checkout sessions opened from a stored cart.

use std::cell::Cell;

use jiff::{Timestamp, ToSpan};
use testresult::TestResult;

use tally::prelude::*;

#[derive(Debug)]
struct ManualClock(Cell<Timestamp>);

impl ManualClock {
    fn starting_at(now: &str) -> TestResult<Self> {
        Ok(Self(Cell::new(now.parse()?)))
    }

    fn advance(&self, span: jiff::Span) -> TestResult {
        self.0.set(self.0.get().checked_add(span)?);

        Ok(())
    }
}

impl Clock for &ManualClock {
    fn now(&self) -> Timestamp {
        self.0.get()
    }
}

fn customer() -> CustomerInfo {
    CustomerInfo {
        document: Some("123.456.789-09".to_string()),
        document_type: Some(DocumentType::Cpf),
        ..CustomerInfo::new("Ana Souza", "ana@example.com")
    }
}

fn filled_service(clock: &ManualClock) -> TestResult<CartService<MemoryStore, &ManualClock>> {
    let mut service = CartService::with_clock(MemoryStore::new(), CartConfig::default(), clock);

    service.add_item(CartItem::new(
        "plan-1",
        "essential",
        "Essential Plan",
        3_000,
        Currency::Brl,
    ))?;
    service.apply_coupon("SAVE50")?;

    Ok(service)
}

#[test]
fn session_freezes_discounted_total() -> TestResult {
    let clock = ManualClock::starting_at("2026-03-01T12:00:00Z")?;
    let mut service = filled_service(&clock)?;

    let session =
        service.create_checkout_session(customer(), None, Some(PaymentMethod::Bitcoin))?;

    // SAVE50 takes 5000 off a 3000 cart
    assert_eq!(session.total, 0);
    assert_eq!(session.status, CheckoutStatus::Pending);
    assert_eq!(session.user_id, "anonymous");
    assert_eq!(
        session.expires_at,
        "2026-03-01T12:30:00Z".parse::<Timestamp>()?
    );
    assert!(
        service
            .store()
            .keys()
            .any(|key| key == session.storage_key())
    );

    Ok(())
}

#[test]
fn completion_inside_window_clears_cart() -> TestResult {
    let clock = ManualClock::starting_at("2026-03-01T12:00:00Z")?;
    let mut service = filled_service(&clock)?;

    let session = service.create_checkout_session(customer(), None, None)?;

    clock.advance(29.minutes())?;

    let completed = service.complete_checkout(session.id)?;

    assert_eq!(completed.status, CheckoutStatus::Completed);
    assert!(service.current_cart().is_none());
    assert_eq!(service.store().load("xperience_cart")?, None);
    assert_eq!(
        service.checkout_session(session.id)?.status,
        CheckoutStatus::Completed
    );

    Ok(())
}

#[test]
fn completion_after_window_expires_session() -> TestResult {
    let clock = ManualClock::starting_at("2026-03-01T12:00:00Z")?;
    let mut service = filled_service(&clock)?;

    let session = service.create_checkout_session(customer(), None, None)?;

    clock.advance(31.minutes())?;

    assert!(matches!(
        service.complete_checkout(session.id),
        Err(CheckoutError::Expired(id)) if id == session.id
    ));
    assert_eq!(
        service.checkout_session(session.id)?.status,
        CheckoutStatus::Expired
    );
    assert!(service.has_items());

    Ok(())
}

#[test]
fn completed_session_cannot_complete_twice() -> TestResult {
    let clock = ManualClock::starting_at("2026-03-01T12:00:00Z")?;
    let mut service = filled_service(&clock)?;

    let session = service.create_checkout_session(customer(), None, None)?;
    service.complete_checkout(session.id)?;

    assert!(matches!(
        service.complete_checkout(session.id),
        Err(CheckoutError::InvalidTransition {
            from: CheckoutStatus::Completed,
            to: CheckoutStatus::Completed,
        })
    ));

    Ok(())
}

#[test]
fn unknown_session_is_not_found() -> TestResult {
    let clock = ManualClock::starting_at("2026-03-01T12:00:00Z")?;
    let mut service = filled_service(&clock)?;
    let id = uuid::Uuid::now_v7();

    assert!(matches!(
        service.complete_checkout(id),
        Err(CheckoutError::NotFound(missing)) if missing == id
    ));

    Ok(())
}

#[test]
fn emptied_cart_cannot_check_out() -> TestResult {
    let clock = ManualClock::starting_at("2026-03-01T12:00:00Z")?;
    let mut service = filled_service(&clock)?;

    service.update_quantity("plan-1", 0)?;

    assert!(matches!(
        service.create_checkout_session(customer(), None, None),
        Err(CheckoutError::EmptyCart)
    ));

    Ok(())
}

#[test]
fn incomplete_customer_is_rejected() -> TestResult {
    let clock = ManualClock::starting_at("2026-03-01T12:00:00Z")?;
    let mut service = filled_service(&clock)?;

    assert!(matches!(
        service.create_checkout_session(CustomerInfo::new("Ana", "ana"), None, None),
        Err(CheckoutError::InvalidCustomer(_))
    ));
    assert!(service.store().keys().all(|key| !key.starts_with("checkout_")));

    Ok(())
}
