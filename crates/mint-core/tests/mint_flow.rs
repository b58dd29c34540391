mod support;

use std::sync::Arc;

use ledger_wire::{
    bytes_to_address, config_address, firearm_address, instruction_discriminator, PayloadLayout,
};
use mint_core::{
    ErrorKind, MemoryCreditLedger, MemoryInventory, MintConfig, MintError, MintOrchestrator,
    MintRequest, MintResponse, SqliteStore,
};
use registry_client::ClientError;
use support::{
    authority_key, client, harness, item, FailingCommit, FakeLedger, FlakyCredits,
    CONSTRAINT_HAS_ONE, DEALER, DID_NOT_DESERIALIZE, PROGRAM_ID,
};

fn request(inventory_id: i64) -> MintRequest {
    MintRequest {
        inventory_id,
        dealer_id: DEALER.to_string(),
    }
}

#[tokio::test]
async fn mint_spends_one_credit_and_marks_item() {
    let h = harness(FakeLedger::new(), MintConfig::default());
    h.credits.set_balance(DEALER, 1);
    h.inventory.insert(item(42, DEALER));

    let receipt = h.orchestrator.mint(&request(42)).await.unwrap();

    assert_eq!(h.credits.balance(DEALER), 0);
    let stored = h.inventory.snapshot(42).unwrap();
    assert!(stored.minted);
    assert_eq!(stored.tx_signature.as_deref(), Some(receipt.tx_signature.as_str()));

    let firearm = firearm_address(&PROGRAM_ID, receipt.allocated_id).unwrap();
    assert_eq!(receipt.derived_addresses.firearm, bytes_to_address(&firearm));
    assert_eq!(
        receipt.derived_addresses.config,
        bytes_to_address(&config_address(&PROGRAM_ID).unwrap())
    );
    assert_eq!(receipt.allocated_id, 0);
    assert!(h.ledger.account(&firearm).is_some());
    assert_eq!(h.ledger.registry_config().unwrap().next_id, 1);

    assert_eq!(
        h.ledger.submitted_discriminators(),
        vec![
            instruction_discriminator("initialize"),
            instruction_discriminator("mint_firearm"),
        ]
    );
}

#[tokio::test]
async fn empty_balance_fails_before_any_rpc() {
    let h = harness(FakeLedger::new(), MintConfig::default());
    h.credits.set_balance(DEALER, 0);
    h.inventory.insert(item(42, DEALER));

    let err = h.orchestrator.mint(&request(42)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InsufficientResourceError);
    assert_eq!(h.ledger.calls(), 0);
    assert_eq!(h.credits.balance(DEALER), 0);
    assert!(!h.inventory.snapshot(42).unwrap().minted);
}

#[tokio::test]
async fn undispatched_mint_refunds_and_names_both_handlers() {
    let h = harness(FakeLedger::new().without_mint_handler(), MintConfig::default());
    h.credits.set_balance(DEALER, 1);
    h.inventory.insert(item(42, DEALER));

    let err = h.orchestrator.mint(&request(42)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ChainRejectionError);
    let message = err.to_string();
    assert!(message.contains("mint_firearm"), "{message}");
    assert!(message.contains("mintFirearm"), "{message}");
    match &err {
        MintError::DiscriminatorMismatch { attempts } => assert_eq!(attempts.len(), 2),
        other => panic!("expected discriminator mismatch, got {other:?}"),
    }

    assert_eq!(h.credits.balance(DEALER), 1);
    assert!(!h.inventory.snapshot(42).unwrap().minted);
    assert_eq!(h.ledger.registry_config().unwrap().next_id, 0);
}

#[tokio::test]
async fn legacy_handler_name_is_tried_once() {
    let h = harness(
        FakeLedger::new().with_mint_handler("mintFirearm"),
        MintConfig::default(),
    );
    h.credits.set_balance(DEALER, 1);
    h.inventory.insert(item(42, DEALER));

    let receipt = h.orchestrator.mint(&request(42)).await.unwrap();

    assert_eq!(receipt.allocated_id, 0);
    assert_eq!(h.credits.balance(DEALER), 0);
    assert_eq!(
        h.ledger.submitted_discriminators(),
        vec![
            instruction_discriminator("initialize"),
            instruction_discriminator("mint_firearm"),
            instruction_discriminator("mintFirearm"),
        ]
    );
}

#[tokio::test]
async fn disabled_fallback_stops_after_canonical_name() {
    let config = MintConfig {
        legacy_discriminator_fallback: false,
        ..MintConfig::default()
    };
    let h = harness(FakeLedger::new().with_mint_handler("mintFirearm"), config);
    h.credits.set_balance(DEALER, 1);
    h.inventory.insert(item(42, DEALER));

    let err = h.orchestrator.mint(&request(42)).await.unwrap_err();

    match &err {
        MintError::DiscriminatorMismatch { attempts } => {
            assert_eq!(attempts.len(), 1);
            assert_eq!(attempts[0].handler, "mint_firearm");
        }
        other => panic!("expected discriminator mismatch, got {other:?}"),
    }
    assert_eq!(h.ledger.submitted().len(), 2);
    assert_eq!(h.credits.balance(DEALER), 1);
}

#[tokio::test]
async fn program_rejection_is_not_retried_with_legacy_name() {
    let stranger = [9u8; 32];
    let h = harness(
        FakeLedger::new().with_config(stranger, 0),
        MintConfig::default(),
    );
    h.credits.set_balance(DEALER, 1);
    h.inventory.insert(item(42, DEALER));

    let err = h.orchestrator.mint(&request(42)).await.unwrap_err();

    match &err {
        MintError::ChainRejected(r) => assert_eq!(r.custom_code, Some(CONSTRAINT_HAS_ONE)),
        other => panic!("expected chain rejection, got {other:?}"),
    }
    assert_eq!(h.ledger.submitted().len(), 1);
    assert_eq!(h.credits.balance(DEALER), 1);
}

#[tokio::test]
async fn payload_layout_must_match_program() {
    let ledger = FakeLedger::new().with_layout(PayloadLayout::WithoutAcquisitionDate);
    let h = harness(ledger, MintConfig::default());
    h.credits.set_balance(DEALER, 1);
    h.inventory.insert(item(42, DEALER));

    let err = h.orchestrator.mint(&request(42)).await.unwrap_err();
    match &err {
        MintError::ChainRejected(r) => assert_eq!(r.custom_code, Some(DID_NOT_DESERIALIZE)),
        other => panic!("expected chain rejection, got {other:?}"),
    }
    assert_eq!(h.credits.balance(DEALER), 1);

    let config = MintConfig {
        payload_layout: PayloadLayout::WithoutAcquisitionDate,
        ..MintConfig::default()
    };
    let ledger = FakeLedger::new().with_layout(PayloadLayout::WithoutAcquisitionDate);
    let h = harness(ledger, config);
    h.credits.set_balance(DEALER, 1);
    h.inventory.insert(item(42, DEALER));
    h.orchestrator.mint(&request(42)).await.unwrap();
}

#[tokio::test]
async fn validation_failures_have_no_side_effects() {
    let h = harness(FakeLedger::new(), MintConfig::default());
    h.credits.set_balance(DEALER, 3);
    h.inventory.insert(item(1, "dealer-2"));
    let mut minted = item(2, DEALER);
    minted.minted = true;
    h.inventory.insert(minted);

    let missing = h.orchestrator.mint(&request(99)).await.unwrap_err();
    assert!(matches!(missing, MintError::NotFound(99)));

    let forbidden = h.orchestrator.mint(&request(1)).await.unwrap_err();
    assert!(matches!(forbidden, MintError::Forbidden { inventory_id: 1, .. }));

    let already = h.orchestrator.mint(&request(2)).await.unwrap_err();
    assert!(matches!(already, MintError::AlreadyMinted(2)));

    for err in [missing, forbidden, already] {
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }
    assert_eq!(h.ledger.calls(), 0);
    assert_eq!(h.credits.balance(DEALER), 3);
}

#[tokio::test]
async fn consecutive_mints_allocate_increasing_ids() {
    let h = harness(FakeLedger::new(), MintConfig::default());
    h.credits.set_balance(DEALER, 2);
    h.inventory.insert(item(1, DEALER));
    h.inventory.insert(item(2, DEALER));

    let first = h.orchestrator.mint(&request(1)).await.unwrap();
    let second = h.orchestrator.mint(&request(2)).await.unwrap();

    assert_eq!((first.allocated_id, second.allocated_id), (0, 1));
    assert_ne!(
        first.derived_addresses.firearm,
        second.derived_addresses.firearm
    );
    assert_eq!(h.credits.balance(DEALER), 0);

    let err = h.orchestrator.mint(&request(1)).await.unwrap_err();
    assert!(matches!(err, MintError::AlreadyMinted(1)));
}

#[tokio::test]
async fn expired_confirmation_refunds_credit() {
    let authority = authority_key().verifying_key().to_bytes();
    let ledger = FakeLedger::new()
        .with_config(authority, 0)
        .dropping_transactions();
    let h = harness(ledger, MintConfig::default());
    h.credits.set_balance(DEALER, 1);
    h.inventory.insert(item(42, DEALER));

    let err = h.orchestrator.mint(&request(42)).await.unwrap_err();

    assert!(matches!(
        err,
        MintError::ChainUnavailable(ClientError::Expired { .. })
    ));
    assert_eq!(err.kind(), ErrorKind::ChainUnavailableError);
    assert_eq!(h.credits.balance(DEALER), 1);
    assert!(!h.inventory.snapshot(42).unwrap().minted);

    let dropped = h.ledger.submitted().last().map(|tx| tx.signatures[0]).unwrap();
    let response = MintResponse::failure(&err);
    assert_eq!(
        response.tx_signature,
        Some(ledger_wire::signature_to_string(&dropped))
    );
}

#[tokio::test]
async fn rejected_initialize_refunds_credit() {
    let h = harness(FakeLedger::new().rejecting_initialize(), MintConfig::default());
    h.credits.set_balance(DEALER, 1);
    h.inventory.insert(item(42, DEALER));

    let err = h.orchestrator.mint(&request(42)).await.unwrap_err();

    assert!(matches!(err, MintError::ChainRejected(_)));
    assert_eq!(err.kind(), ErrorKind::ChainRejectionError);
    assert_eq!(h.credits.balance(DEALER), 1);
    assert!(!h.inventory.snapshot(42).unwrap().minted);
    assert!(h.ledger.registry_config().is_none());
    assert_eq!(
        h.ledger.submitted_discriminators(),
        vec![instruction_discriminator("initialize")]
    );
}

#[tokio::test]
async fn expired_initialize_refunds_credit() {
    let h = harness(FakeLedger::new().dropping_transactions(), MintConfig::default());
    h.credits.set_balance(DEALER, 1);
    h.inventory.insert(item(42, DEALER));

    let err = h.orchestrator.mint(&request(42)).await.unwrap_err();

    assert!(matches!(
        err,
        MintError::ChainUnavailable(ClientError::Expired { .. })
    ));
    assert_eq!(h.credits.balance(DEALER), 1);
    assert_eq!(h.ledger.submitted().len(), 1);
}

#[tokio::test]
async fn reserve_error_is_refunded_by_reference() {
    let ledger = Arc::new(FakeLedger::new());
    let inventory = Arc::new(MemoryInventory::new());
    inventory.insert(item(42, DEALER));
    let credits = Arc::new(MemoryCreditLedger::with_balance(DEALER, 1));
    let flaky = FlakyCredits {
        fail_after_reserve: true,
        ..FlakyCredits::new(credits.clone())
    };
    let orchestrator = MintOrchestrator::new(
        client(ledger.clone()),
        inventory.clone(),
        flaky,
        MintConfig::default(),
    );

    let err = orchestrator.mint(&request(42)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StoreError);
    assert_eq!(credits.balance(DEALER), 1);
    assert_eq!(ledger.calls(), 0);
    assert!(!inventory.snapshot(42).unwrap().minted);
}

#[tokio::test]
async fn failed_refund_still_returns_chain_error() {
    let ledger = Arc::new(FakeLedger::new().without_mint_handler());
    let inventory = Arc::new(MemoryInventory::new());
    inventory.insert(item(42, DEALER));
    let credits = Arc::new(MemoryCreditLedger::with_balance(DEALER, 1));
    let flaky = FlakyCredits {
        fail_refund: true,
        ..FlakyCredits::new(credits.clone())
    };
    let orchestrator = MintOrchestrator::new(
        client(ledger),
        inventory.clone(),
        flaky,
        MintConfig::default(),
    );

    let err = orchestrator.mint(&request(42)).await.unwrap_err();

    assert!(matches!(err, MintError::DiscriminatorMismatch { .. }));
    assert_eq!(err.kind(), ErrorKind::ChainRejectionError);
    // The reservation stands because the refund itself failed.
    assert_eq!(credits.balance(DEALER), 0);
    assert!(!inventory.snapshot(42).unwrap().minted);
}

#[tokio::test]
async fn status_read_errors_do_not_abort_confirmation() {
    let h = harness(
        FakeLedger::new().with_failing_status_reads(2),
        MintConfig::default(),
    );
    h.credits.set_balance(DEALER, 1);
    h.inventory.insert(item(42, DEALER));

    let receipt = h.orchestrator.mint(&request(42)).await.unwrap();

    assert_eq!(receipt.allocated_id, 0);
    assert_eq!(h.credits.balance(DEALER), 0);
    assert!(h.inventory.snapshot(42).unwrap().minted);
}

#[tokio::test]
async fn unreachable_status_keeps_credit_and_reports_signature() {
    let authority = authority_key().verifying_key().to_bytes();
    let ledger = FakeLedger::new()
        .with_config(authority, 0)
        .with_failing_status_reads(usize::MAX);
    let h = harness(ledger, MintConfig::default());
    h.credits.set_balance(DEALER, 1);
    h.inventory.insert(item(42, DEALER));

    let err = h.orchestrator.mint(&request(42)).await.unwrap_err();

    assert!(matches!(err, MintError::OutcomeUnknown { .. }));
    assert_eq!(err.kind(), ErrorKind::ChainUnavailableError);
    let sent = h.ledger.submitted().last().map(|tx| tx.signatures[0]).unwrap();
    let sent = ledger_wire::signature_to_string(&sent);
    assert_eq!(err.signature(), Some(sent.as_str()));
    assert_eq!(MintResponse::failure(&err).tx_signature, Some(sent));

    // The transaction landed; the credit stays reserved until reconciled.
    assert_eq!(h.credits.balance(DEALER), 0);
    assert_eq!(h.ledger.registry_config().unwrap().next_id, 1);
    assert!(!h.inventory.snapshot(42).unwrap().minted);
}

#[tokio::test]
async fn failed_commit_returns_signature_and_refunds() {
    let ledger = Arc::new(FakeLedger::new());
    let inventory = Arc::new(mint_core::MemoryInventory::new());
    inventory.insert(item(42, DEALER));
    let credits = Arc::new(MemoryCreditLedger::with_balance(DEALER, 1));
    let orchestrator = MintOrchestrator::new(
        client(ledger.clone()),
        FailingCommit(inventory.clone()),
        credits.clone(),
        MintConfig::default(),
    );

    let err = orchestrator.mint(&request(42)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConsistencyWarning);
    let signature = err.signature().unwrap().to_string();
    let landed = ledger.submitted().last().map(|tx| tx.signatures[0]).unwrap();
    assert_eq!(signature, ledger_wire::signature_to_string(&landed));
    assert_eq!(ledger.registry_config().unwrap().next_id, 1);
    assert_eq!(credits.balance(DEALER), 1);
    assert!(!inventory.snapshot(42).unwrap().minted);

    let response = MintResponse::failure(&err);
    assert_eq!(response.tx_signature.as_deref(), Some(signature.as_str()));
    assert_eq!(
        response.message.as_deref(),
        Some("minted on-chain but commit failed")
    );
}

#[tokio::test]
async fn sqlite_collaborators_drive_a_full_mint() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    store.set_balance(DEALER, 1).unwrap();
    store.insert_item(&item(42, DEALER)).unwrap();

    let ledger = Arc::new(FakeLedger::new());
    let orchestrator = MintOrchestrator::new(
        client(ledger.clone()),
        store.clone(),
        store.clone(),
        MintConfig::default(),
    );

    let receipt = orchestrator.mint(&request(42)).await.unwrap();
    assert_eq!(store.balance(DEALER).unwrap(), 0);

    use mint_core::InventoryStore;
    let stored = store.get(42).await.unwrap().unwrap();
    assert!(stored.minted);
    assert_eq!(stored.tx_signature, Some(receipt.tx_signature));

    let again = orchestrator.mint(&request(42)).await.unwrap_err();
    assert!(matches!(again, MintError::AlreadyMinted(42)));
    assert_eq!(store.balance(DEALER).unwrap(), 0);
}
