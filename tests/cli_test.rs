mod common;

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::process::Command;
use tempfile::tempdir;

fn responses(stdout: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn day_of_service() -> Vec<Value> {
    vec![
        json!({"command": "create_order", "at": "2024-01-10T11:00:00Z", "order_type": "onsite",
               "items": [{"product_id": 1, "quantity": 1}, {"product_id": 2, "quantity": 1},
                         {"product_id": 3, "quantity": 1}]}),
        json!({"command": "record_payment", "order_id": 1,
               "entries": [{"method": "cash", "amount": "10.00"}, {"method": "card", "amount": "8.00"}]}),
        json!({"command": "record_payment", "order_id": 1, "entries": [{"method": "cash", "amount": "0.01"}]}),
        json!({"command": "transition", "order_id": 1, "target": "in_preparation", "actor": "kitchen"}),
        json!({"command": "transition", "order_id": 1, "target": "ready", "actor": "kitchen"}),
        json!({"command": "transition", "order_id": 1, "target": "completed", "actor": "counter"}),
        json!({"command": "close_day", "at": "2024-01-10T23:00:00Z", "date": "2024-01-10", "actor": "manager"}),
        json!({"command": "close_day", "date": "2024-01-10"}),
    ]
}

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let catalog = dir.path().join("catalog.json");
    let commands = dir.path().join("commands.jsonl");
    common::write_catalog(&catalog, json!([]));
    common::write_commands(&commands, &day_of_service());

    let output = Command::new(cargo_bin!("caisse"))
        .arg(&commands)
        .arg("--catalog")
        .arg(&catalog)
        .output()?;
    assert!(output.status.success());

    let lines = responses(&output.stdout);
    assert_eq!(lines.len(), 8);
    assert_eq!(lines[0]["ok"], true);
    assert_eq!(lines[0]["result"]["total"], "18.00");
    assert_eq!(lines[1]["result"]["payment_status"], "paid");
    assert_eq!(lines[2]["ok"], false);
    assert_eq!(lines[2]["code"], "overpayment_rejected");
    assert_eq!(lines[2]["status"], 422);
    assert_eq!(lines[5]["result"]["status"], "completed");
    assert_eq!(lines[6]["result"]["sequence"], 1);
    assert_eq!(lines[6]["result"]["gross_sales"], "18.00");
    assert_eq!(lines[6]["result"]["vat_collected"], "1.64");
    assert_eq!(lines[7]["code"], "already_closed");

    Ok(())
}

#[test]
fn test_malformed_line_is_reported_and_skipped() {
    let dir = tempdir().unwrap();
    let catalog = dir.path().join("catalog.json");
    let commands = dir.path().join("commands.jsonl");
    common::write_catalog(&catalog, json!([]));
    std::fs::write(
        &commands,
        concat!(
            r#"{"command":"create_order","at":"2024-01-10T11:00:00Z","order_type":"takeaway","items":[{"product_id":2,"quantity":1}]}"#,
            "\n",
            "this is not json\n",
            r#"{"command":"redeem_cashback","order_id":1,"amount":"-1.00"}"#,
            "\n",
            r#"{"command":"get_order","order_id":1}"#,
            "\n",
        ),
    )
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("caisse"));
    cmd.arg(&commands).arg("--catalog").arg(&catalog);
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error reading command: line 2"))
        .stderr(predicate::str::contains("line 3"))
        .stdout(predicate::str::contains(r#""total":"3.50""#));
}

#[test]
fn test_unknown_order_and_illegal_transition() {
    let dir = tempdir().unwrap();
    let catalog = dir.path().join("catalog.json");
    let commands = dir.path().join("commands.jsonl");
    common::write_catalog(&catalog, json!([]));
    common::write_commands(
        &commands,
        &[
            json!({"command": "get_order", "order_id": 99}),
            json!({"command": "create_order", "order_type": "onsite", "items": [{"product_id": 4, "quantity": 2}]}),
            json!({"command": "transition", "order_id": 1, "target": "completed"}),
        ],
    );

    let output = Command::new(cargo_bin!("caisse"))
        .arg(&commands)
        .arg("--catalog")
        .arg(&catalog)
        .output()
        .unwrap();
    let lines = responses(&output.stdout);
    assert_eq!(lines[0]["status"], 404);
    assert_eq!(lines[1]["result"]["total"], "13.00");
    assert_eq!(lines[2]["code"], "illegal_transition");
    assert_eq!(lines[2]["status"], 409);
}

#[test]
fn test_promotions_from_catalog_file() {
    let dir = tempdir().unwrap();
    let catalog = dir.path().join("catalog.json");
    let commands = dir.path().join("commands.jsonl");
    common::write_catalog(
        &catalog,
        json!([{"id": 1, "name": "Hiver", "kind": {"type": "percentage", "percent": "10"}}]),
    );
    common::write_commands(
        &commands,
        &[json!({"command": "create_order", "at": "2024-01-10T11:00:00Z", "order_type": "delivery",
                 "delivery_fee": "2.50", "items": [{"product_id": 5, "quantity": 1}, {"product_id": 4, "quantity": 1}]})],
    );

    let mut cmd = Command::new(cargo_bin!("caisse"));
    cmd.arg(&commands).arg("--catalog").arg(&catalog);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(r#""ticket_text":"Hiver -10%""#))
        .stdout(predicate::str::contains(r#""total":"23.65""#));
}

#[test]
fn test_tickets_csv_and_locked_methods() {
    let dir = tempdir().unwrap();
    let catalog = dir.path().join("catalog.json");
    let commands = dir.path().join("commands.jsonl");
    let tickets = dir.path().join("tickets.csv");
    common::write_catalog(&catalog, json!([]));

    let mut script = day_of_service();
    script.truncate(7);
    script.insert(
        1,
        json!({"command": "create_order", "order_type": "takeaway", "items": [{"product_id": 2, "quantity": 1}]}),
    );
    // Order 2 is paid by card, then the card is declared locked for this run.
    script.insert(
        2,
        json!({"command": "record_payment", "order_id": 2, "entries": [{"method": "card", "amount": "3.50"}]}),
    );
    script.insert(
        3,
        json!({"command": "modify_payment", "order_id": 2, "entries": [{"method": "cash", "amount": "3.50"}]}),
    );
    script.insert(
        4,
        json!({"command": "transition", "order_id": 2, "target": "canceled", "reason": "doublon"}),
    );
    common::write_commands(&commands, &script);

    let output = Command::new(cargo_bin!("caisse"))
        .arg(&commands)
        .arg("--catalog")
        .arg(&catalog)
        .arg("--locked-method")
        .arg("card")
        .arg("--tickets-csv")
        .arg(&tickets)
        .output()
        .unwrap();
    assert!(output.status.success());

    let lines = responses(&output.stdout);
    assert_eq!(lines[3]["code"], "payment_locked");
    assert_eq!(lines[3]["status"], 423);
    assert_eq!(lines[4]["result"]["status"], "canceled");

    let csv = std::fs::read_to_string(&tickets).unwrap();
    let rows: Vec<&str> = csv.lines().collect();
    assert_eq!(
        rows[0],
        "date,sequence,completed_orders,canceled_orders,gross_sales,vat_collected,net_sales,method,method_amount,method_count"
    );
    assert_eq!(rows[1], "2024-01-10,1,1,1,18.00,1.64,16.36,cash,10.00,1");
    // The locked card payment on the canceled order is held until refunded upstream.
    assert_eq!(rows[2], "2024-01-10,1,1,1,18.00,1.64,16.36,card,11.50,1");
}

#[test]
fn test_rejects_unknown_locked_method() {
    let dir = tempdir().unwrap();
    let commands = dir.path().join("commands.jsonl");
    common::write_commands(&commands, &[]);

    let mut cmd = Command::new(cargo_bin!("caisse"));
    cmd.arg(&commands).arg("--locked-method").arg("bitcoin");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("unknown payment method: bitcoin"));
}
