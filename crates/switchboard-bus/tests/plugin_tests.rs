// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin manager: dispatch order, persisted positions, rollback on
//! reconfiguration, command handling, and directory connections.

mod common;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use common::{Env, inbound, to_bot};
use switchboard_bus::{ManagerHandle, plugins};
use switchboard_config::model::BusConfig;
use switchboard_core::{LogName, Record, SwitchboardError};
use switchboard_plugin::{Plugger, Plugin, PluginSpec};
use switchboard_storage::queries::{ldap, plugins as plugin_rows};
use switchboard_test_utils::{MockLdap, test_bus_config};

const ONE: &str = r#"[{"account":"one"}]"#;

async fn start(env: &Env, config: &BusConfig) -> ManagerHandle {
    plugins::start(config, env.store(), env.registry.clone(), MockLdap::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn dispatches_matching_records_in_log_order() {
    let env = Env::new().await;
    env.add_plugin("rec", "", ONE).await;
    let manager = start(&env, &test_bus_config()).await;

    env.incoming(inbound("#c", "joe", "first")).await;
    env.incoming(Record {
        account: "two".into(),
        ..inbound("#c", "joe", "elsewhere")
    })
    .await;
    env.incoming(inbound("#c", "joe", "second")).await;
    let last = env.incoming(inbound("", "joe", "third")).await;

    env.recorder.wait_messages(3).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(env.recorder.texts("rec").await, ["first", "second", "third"]);
    assert_eq!(env.recorder.messages().await.len(), 3);

    manager.stop().await;
    assert_eq!(env.plugin_last_id("rec").await, last);
}

#[tokio::test]
async fn instances_see_each_record_in_name_order() {
    let env = Env::new().await;
    env.add_plugin("rec/b", "", ONE).await;
    env.add_plugin("rec/a", "", ONE).await;
    let manager = start(&env, &test_bus_config()).await;
    env.recorder.wait_starts(2).await;

    env.incoming(inbound("#c", "joe", "one")).await;
    env.incoming(inbound("#c", "joe", "two")).await;

    let seen: Vec<(String, String)> = env
        .recorder
        .wait_messages(4)
        .await
        .into_iter()
        .map(|(name, r)| (name, r.text))
        .collect();
    let expected = [("rec/a", "one"), ("rec/b", "one"), ("rec/a", "two"), ("rec/b", "two")]
        .map(|(n, t)| (n.to_string(), t.to_string()));
    assert_eq!(seen, expected);

    manager.stop().await;
}

#[tokio::test]
async fn restart_resumes_after_the_persisted_position() {
    let env = Env::new().await;
    env.add_plugin("rec", "", ONE).await;
    let config = test_bus_config();

    let manager = start(&env, &config).await;
    env.incoming(inbound("#c", "joe", "a")).await;
    env.incoming(inbound("#c", "joe", "b")).await;
    env.recorder.wait_messages(2).await;
    manager.stop().await;
    assert_eq!(env.recorder.stops(), 1);

    env.incoming(inbound("#c", "joe", "c")).await;
    let manager = start(&env, &config).await;
    env.recorder.wait_messages(3).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(env.recorder.texts("rec").await, ["a", "b", "c"]);

    manager.stop().await;
}

#[tokio::test]
async fn records_older_than_the_rollback_limit_are_not_replayed() {
    let env = Env::new().await;
    env.add_plugin("rec", "", ONE).await;
    env.incoming(Record {
        time: Some(Utc::now() - TimeDelta::hours(1)),
        ..inbound("#c", "joe", "stale")
    })
    .await;
    env.incoming(inbound("#c", "joe", "fresh")).await;

    let manager = start(&env, &test_bus_config()).await;
    env.recorder.wait_messages(1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(env.recorder.texts("rec").await, ["fresh"]);

    manager.stop().await;
}

#[tokio::test]
async fn new_instance_rolls_back_without_redelivering_to_others() {
    let env = Env::new().await;
    env.add_plugin("rec", "", ONE).await;
    let manager = start(&env, &test_bus_config()).await;

    env.incoming(inbound("#c", "joe", "a")).await;
    env.incoming(inbound("#c", "joe", "b")).await;
    env.recorder.wait_messages(2).await;

    env.add_plugin("rec/new", "", ONE).await;
    manager.refresh().await.unwrap();
    env.recorder.wait_messages(4).await;
    env.incoming(inbound("#c", "joe", "c")).await;
    env.recorder.wait_messages(6).await;

    assert_eq!(env.recorder.texts("rec").await, ["a", "b", "c"]);
    assert_eq!(env.recorder.texts("rec/new").await, ["a", "b", "c"]);

    manager.stop().await;
}

#[tokio::test]
async fn changed_config_restarts_the_instance() {
    let env = Env::new().await;
    env.add_plugin("rec", "", ONE).await;
    let manager = start(&env, &test_bus_config()).await;
    env.recorder.wait_starts(1).await;
    env.incoming(inbound("#c", "joe", "before")).await;
    env.recorder.wait_messages(1).await;

    env.add_plugin("rec", r#"{"mode":"new"}"#, ONE).await;
    manager.refresh().await.unwrap();
    assert_eq!(env.recorder.stops(), 1);
    assert_eq!(env.recorder.starts(), 2);

    env.incoming(inbound("#c", "joe", "after")).await;
    env.recorder.wait_messages(2).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(env.recorder.texts("rec").await, ["before", "after"]);

    // Unchanged rows leave the instance alone.
    manager.refresh().await.unwrap();
    assert_eq!(env.recorder.starts(), 2);

    manager.stop().await;
}

#[tokio::test]
async fn removed_instance_is_stopped() {
    let env = Env::new().await;
    env.add_plugin("rec", "", ONE).await;
    let manager = start(&env, &test_bus_config()).await;
    env.recorder.wait_starts(1).await;

    plugin_rows::delete_plugin(env.storage.db().unwrap(), "rec")
        .await
        .unwrap();
    manager.refresh().await.unwrap();
    assert_eq!(env.recorder.stops(), 1);

    env.incoming(inbound("#c", "joe", "unseen")).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(env.recorder.messages().await.is_empty());

    manager.stop().await;
    assert_eq!(env.recorder.stops(), 1);
}

#[tokio::test]
async fn broken_rows_are_skipped() {
    let env = Env::new().await;
    env.add_plugin("nosuch", "", ONE).await;
    env.add_plugin("rec/badtargets", "", "{not json").await;
    env.add_plugin("rec/badconfig", "{not json", ONE).await;
    env.add_plugin("rec/ok", "", ONE).await;
    let manager = start(&env, &test_bus_config()).await;

    env.incoming(inbound("#c", "joe", "hello")).await;
    env.recorder.wait_messages(1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(env.recorder.texts("rec/ok").await, ["hello"]);
    assert_eq!(env.recorder.messages().await.len(), 1);

    manager.stop().await;
}

#[tokio::test]
async fn panicking_handler_does_not_stall_dispatch() {
    let env = Env::new().await;
    env.add_plugin("rec", "", ONE).await;
    let manager = start(&env, &test_bus_config()).await;

    let bad = env.incoming(inbound("#c", "joe", "please panic")).await;
    env.incoming(inbound("#c", "joe", "after")).await;

    env.recorder.wait_messages(2).await;
    assert_eq!(env.recorder.texts("rec").await, ["please panic", "after"]);
    manager.stop().await;
    assert!(env.plugin_last_id("rec").await > bad);
}

/// Starts fine, panics when stopped.
struct Fragile;

#[async_trait]
impl Plugin for Fragile {
    async fn stop(&self) -> Result<(), SwitchboardError> {
        panic!("fragile plugin stopped");
    }
}

fn crashing_specs() -> Vec<PluginSpec> {
    vec![
        PluginSpec::new(
            "boom",
            |_: Plugger| -> Result<Box<dyn Plugin>, SwitchboardError> {
                panic!("boom cannot start")
            },
        ),
        PluginSpec::new(
            "fragile",
            |_: Plugger| -> Result<Box<dyn Plugin>, SwitchboardError> { Ok(Box::new(Fragile)) },
        ),
    ]
}

#[tokio::test]
async fn panicking_start_skips_only_that_instance() {
    let env = Env::with_specs(crashing_specs()).await;
    env.add_plugin("boom", "", ONE).await;
    env.add_plugin("rec", "", ONE).await;
    let manager = start(&env, &test_bus_config()).await;
    env.recorder.wait_starts(1).await;

    env.incoming(inbound("#c", "joe", "still here")).await;
    env.recorder.wait_messages(1).await;
    manager.refresh().await.unwrap();
    env.incoming(inbound("#c", "joe", "and again")).await;
    env.recorder.wait_messages(2).await;
    assert_eq!(env.recorder.texts("rec").await, ["still here", "and again"]);

    manager.stop().await;
    assert_eq!(env.recorder.stops(), 1);
}

#[tokio::test]
async fn panicking_stop_does_not_end_the_manager() {
    let env = Env::with_specs(crashing_specs()).await;
    env.add_plugin("fragile", "", ONE).await;
    env.add_plugin("rec", "", ONE).await;
    let manager = start(&env, &test_bus_config()).await;
    env.recorder.wait_starts(1).await;

    plugin_rows::delete_plugin(env.storage.db().unwrap(), "fragile")
        .await
        .unwrap();
    manager.refresh().await.unwrap();

    env.incoming(inbound("#c", "joe", "after the crash")).await;
    env.recorder.wait_messages(1).await;
    assert_eq!(env.recorder.texts("rec").await, ["after the crash"]);
    manager.refresh().await.unwrap();

    manager.stop().await;
    assert_eq!(env.recorder.stops(), 1);
}

#[tokio::test]
async fn commands_are_parsed_and_errors_replied() {
    let env = Env::new().await;
    env.add_plugin("rec", "", ONE).await;
    let manager = start(&env, &test_bus_config()).await;
    let mut outgoing = env.reader(LogName::Outgoing).await;

    env.incoming(to_bot("#c", "joe", "cmd hello there")).await;
    let reply = outgoing.next().await;
    assert_eq!(reply.to_string(), "PRIVMSG #c :joe: got: hello there");
    assert_eq!(reply.account, "one");

    env.incoming(to_bot("", "joe", "cmd")).await;
    let reply = outgoing.next().await;
    assert_eq!(
        reply.to_string(),
        "PRIVMSG joe :Oops: missing input for argument: text"
    );

    // Unknown commands and plain text are messages only.
    env.incoming(to_bot("#c", "joe", "nosuch thing")).await;
    env.recorder.wait_messages(3).await;
    assert!(outgoing.silent_for(Duration::from_millis(100)).await);

    let commands = env.recorder.commands().await;
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].1.args.str("text"), "hello there");

    manager.stop().await;
}

#[tokio::test]
async fn outgoing_echoes_reach_only_the_outgoing_handler() {
    let env = Env::new().await;
    env.add_plugin("rec", "", ONE).await;
    let manager = start(&env, &test_bus_config()).await;

    env.incoming(Record::message("one", "#c", "", "cmd sent by the bot"))
        .await;
    let seen = env.recorder.wait_outgoing(1).await;
    assert_eq!(seen[0].1.text, "cmd sent by the bot");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(env.recorder.messages().await.is_empty());
    assert!(env.recorder.commands().await.is_empty());

    manager.stop().await;
}

#[tokio::test]
async fn wake_records_are_not_dispatched() {
    let env = Env::new().await;
    env.add_plugin("rec", "", r#"[{}]"#).await;
    let manager = start(&env, &test_bus_config()).await;

    env.incoming(Record::wake()).await;
    env.incoming(inbound("#c", "joe", "real")).await;
    env.recorder.wait_messages(1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(env.recorder.texts("rec").await, ["real"]);

    manager.stop().await;
}

#[tokio::test]
async fn plugin_filter_limits_started_instances() {
    let env = Env::new().await;
    env.add_plugin("rec/a", "", ONE).await;
    env.add_plugin("rec/b", "", ONE).await;
    let config = BusConfig {
        plugins: Some(vec!["rec/a".into()]),
        ..test_bus_config()
    };
    let manager = start(&env, &config).await;

    env.incoming(inbound("#c", "joe", "hi")).await;
    env.recorder.wait_messages(1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(env.recorder.starts(), 1);
    assert_eq!(env.recorder.texts("rec/a").await, ["hi"]);

    manager.stop().await;
}

#[tokio::test]
async fn empty_plugin_filter_runs_nothing() {
    let env = Env::new().await;
    env.add_plugin("rec", "", ONE).await;
    let config = BusConfig {
        plugins: Some(vec![]),
        ..test_bus_config()
    };
    let manager = start(&env, &config).await;

    manager.refresh().await.unwrap();
    env.incoming(inbound("#c", "joe", "hi")).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(env.recorder.starts(), 0);

    manager.stop().await;
}

#[tokio::test]
async fn schemas_are_published_for_enabled_specs() {
    let env = Env::new().await;
    env.add_plugin("rec/x", "", ONE).await;
    let manager = start(&env, &test_bus_config()).await;
    env.recorder.wait_starts(1).await;
    manager.refresh().await.unwrap();

    let db = env.storage.db().unwrap();
    let known = plugin_rows::known_commands(db, "rec").await.unwrap();
    assert!(known.is_some_and(|json| json.contains("\"cmd\"")));
    let instance = plugin_rows::instance_commands(db, "rec/x").await.unwrap();
    assert!(instance.is_some_and(|json| json.contains("\"ldap\"")));

    manager.stop().await;
}

#[tokio::test]
async fn directory_connections_follow_the_ldap_table() {
    let env = Env::new().await;
    env.add_plugin("rec", "", ONE).await;
    let db = env.storage.db().unwrap();
    ldap::upsert_ldap(db, "corp", r#"{"url":"ldap://corp"}"#)
        .await
        .unwrap();
    let directory = MockLdap::new();
    let manager = plugins::start(
        &test_bus_config(),
        env.store(),
        env.registry.clone(),
        directory.clone(),
    )
    .await
    .unwrap();
    let mut outgoing = env.reader(LogName::Outgoing).await;

    // The connection is dialed in the background; ask until it is up.
    let mut reply = String::new();
    for _ in 0..100 {
        env.incoming(to_bot("#c", "joe", "ldap corp")).await;
        reply = outgoing.next().await.text;
        if reply == "joe: dn: ldap://corp" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(reply, "joe: dn: ldap://corp");
    assert_eq!(directory.dials(), 1);

    ldap::delete_ldap(db, "corp").await.unwrap();
    manager.refresh().await.unwrap();
    assert_eq!(directory.closes(), 1);

    env.incoming(to_bot("#c", "joe", "ldap corp")).await;
    assert_eq!(
        outgoing.next().await.text,
        r#"joe: error: LDAP connection "corp" not found"#
    );

    manager.stop().await;
}

#[tokio::test]
async fn stop_is_idempotent_and_final() {
    let env = Env::new().await;
    env.add_plugin("rec", "", ONE).await;
    let manager = start(&env, &test_bus_config()).await;
    env.recorder.wait_starts(1).await;

    manager.stop().await;
    manager.stop().await;
    assert!(manager.is_stopped());
    assert_eq!(env.recorder.stops(), 1);
    assert!(matches!(
        manager.refresh().await,
        Err(SwitchboardError::Stopped)
    ));
}
