mod utils;

use stripe_tax::{
    consts,
    core::{
        errors::TaxProcessingError,
        transactions::{create_tax_transaction, handle_order_refund},
    },
    db::CartInterface,
};
use utils::*;

#[tokio::test]
async fn payment_event_turns_the_recorded_calculation_into_a_transaction() {
    let app = test_app(MockStripeTax::returning(Default::default()));
    app.store
        .insert_cart(cart_with_metadata(
            "cart_1",
            &[(consts::METADATA_TAX_CALCULATION_ID, "calc_1")],
        ))
        .await;

    let transaction = create_tax_transaction(&app.state, &payment_intent("pi_X", Some("cart_1")))
        .await
        .expect("transaction should be created");

    assert_eq!(transaction.id, "tax_1");
    assert_eq!(transaction.reference, "pi_X");
    assert_eq!(
        app.connector.transactions.lock().expect("mock lock poisoned")[..],
        [("calc_1".to_string(), "pi_X".to_string())]
    );

    let cart = app
        .store
        .find_cart_by_id("cart_1")
        .await
        .expect("cart should exist");
    assert_eq!(
        cart.metadata.get(consts::METADATA_TAX_TRANSACTION_ID),
        Some(&"tax_1".to_string())
    );
    assert_eq!(
        cart.metadata.get(consts::METADATA_PAYMENT_INTENT),
        Some(&"pi_X".to_string())
    );
    assert_eq!(
        cart.metadata.get(consts::METADATA_TAX_REFERENCE),
        Some(&"pi_X".to_string())
    );
    // The calculation reference survives the shallow merge.
    assert_eq!(
        cart.metadata.get(consts::METADATA_TAX_CALCULATION_ID),
        Some(&"calc_1".to_string())
    );
}

#[tokio::test]
async fn payment_event_without_a_cart_reference_is_rejected() {
    let app = test_app(MockStripeTax::returning(Default::default()));

    let error = create_tax_transaction(&app.state, &payment_intent("pi_X", None))
        .await
        .expect_err("missing resource_id should fail");
    assert_eq!(
        error.current_context(),
        &TaxProcessingError::MissingRequiredField {
            field_name: "metadata.resource_id"
        }
    );
}

#[tokio::test]
async fn cart_without_a_calculation_cannot_be_transacted() {
    let app = test_app(MockStripeTax::returning(Default::default()));
    app.store.insert_cart(cart_with_metadata("cart_1", &[])).await;

    let error = create_tax_transaction(&app.state, &payment_intent("pi_X", Some("cart_1")))
        .await
        .expect_err("missing calculation should fail");
    assert_eq!(
        error.current_context(),
        &TaxProcessingError::TaxCalculationNotFound {
            cart_id: "cart_1".to_string()
        }
    );
    assert!(app
        .connector
        .transactions
        .lock()
        .expect("mock lock poisoned")
        .is_empty());
}

#[tokio::test]
async fn unknown_cart_is_a_not_found_error() {
    let app = test_app(MockStripeTax::returning(Default::default()));

    let error = create_tax_transaction(&app.state, &payment_intent("pi_X", Some("cart_404")))
        .await
        .expect_err("unknown cart should fail");
    assert_eq!(
        error.current_context(),
        &TaxProcessingError::CartNotFound {
            cart_id: "cart_404".to_string()
        }
    );
}

#[tokio::test]
async fn duplicate_payment_event_is_an_invalid_transition() {
    let app = test_app(MockStripeTax::returning(Default::default()));
    app.store
        .insert_cart(cart_with_metadata(
            "cart_1",
            &[
                (consts::METADATA_TAX_CALCULATION_ID, "calc_1"),
                (consts::METADATA_TAX_TRANSACTION_ID, "tax_1"),
            ],
        ))
        .await;

    let error = create_tax_transaction(&app.state, &payment_intent("pi_X", Some("cart_1")))
        .await
        .expect_err("second transaction for one cart should fail");
    assert_eq!(
        error.current_context(),
        &TaxProcessingError::InvalidLifecycleTransition
    );
}

#[tokio::test]
async fn refund_reverses_the_recorded_transaction() {
    let app = test_app(MockStripeTax::returning(Default::default()));
    app.store
        .insert_order(order_with_metadata(
            "order_1",
            &[(consts::METADATA_TAX_TRANSACTION_ID, "tax_1")],
        ))
        .await;

    let order = handle_order_refund(&app.state, "order_1", "ref_1")
        .await
        .expect("reversal should be issued");

    assert_eq!(
        app.connector.reversals.lock().expect("mock lock poisoned")[..],
        [("tax_1".to_string(), "ref_1".to_string())]
    );
    assert_eq!(
        order.metadata.get(consts::METADATA_REVERSAL_TRANSACTION),
        Some(&"tax_rev_1".to_string())
    );
}

#[tokio::test]
async fn refund_for_an_unknown_order_fails() {
    let app = test_app(MockStripeTax::returning(Default::default()));

    let error = handle_order_refund(&app.state, "order_404", "ref_1")
        .await
        .expect_err("unknown order should fail");
    assert_eq!(
        error.current_context(),
        &TaxProcessingError::OrderNotFound {
            order_id: "order_404".to_string()
        }
    );
}

#[tokio::test]
async fn refund_without_a_transaction_fails() {
    let app = test_app(MockStripeTax::returning(Default::default()));
    app.store
        .insert_order(order_with_metadata("order_1", &[]))
        .await;

    let error = handle_order_refund(&app.state, "order_1", "ref_1")
        .await
        .expect_err("missing transaction should fail");
    assert_eq!(
        error.current_context(),
        &TaxProcessingError::TaxTransactionNotFound {
            order_id: "order_1".to_string()
        }
    );
}

#[tokio::test]
async fn second_refund_does_not_issue_a_second_reversal() {
    let app = test_app(MockStripeTax::returning(Default::default()));
    app.store
        .insert_order(order_with_metadata(
            "order_1",
            &[
                (consts::METADATA_TAX_TRANSACTION_ID, "tax_1"),
                (consts::METADATA_REVERSAL_TRANSACTION, "tax_rev_1"),
            ],
        ))
        .await;

    let error = handle_order_refund(&app.state, "order_1", "ref_2")
        .await
        .expect_err("already reversed order should fail");
    assert_eq!(
        error.current_context(),
        &TaxProcessingError::InvalidLifecycleTransition
    );
    assert!(app
        .connector
        .reversals
        .lock()
        .expect("mock lock poisoned")
        .is_empty());
}

#[tokio::test]
async fn refund_subscriber_swallows_handler_failures() {
    let app = test_app(MockStripeTax::returning(Default::default()));

    // No order seeded: the handler fails, the dispatcher logs and returns.
    app.state
        .host_events
        .dispatch(
            &app.state,
            "order.refund_created",
            serde_json::json!({ "id": "order_404", "refund_id": "ref_1" }),
        )
        .await;

    // An unknown event name is ignored rather than dispatched.
    app.state
        .host_events
        .dispatch(&app.state, "order.placed", serde_json::json!({}))
        .await;
}

#[tokio::test]
async fn refund_subscriber_drives_the_reversal_end_to_end() {
    let app = test_app(MockStripeTax::returning(Default::default()));
    app.store
        .insert_order(order_with_metadata(
            "order_1",
            &[(consts::METADATA_TAX_TRANSACTION_ID, "tax_1")],
        ))
        .await;

    app.state
        .host_events
        .dispatch(
            &app.state,
            "order.refund_created",
            serde_json::json!({ "id": "order_1", "refund_id": "ref_1" }),
        )
        .await;

    assert_eq!(
        app.connector.reversals.lock().expect("mock lock poisoned")[..],
        [("tax_1".to_string(), "ref_1".to_string())]
    );
}
