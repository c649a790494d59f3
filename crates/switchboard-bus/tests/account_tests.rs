// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Account manager: channel membership, confirmed delivery, reconnects.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Env, inbound};
use switchboard_bus::{ManagerHandle, accounts};
use switchboard_config::model::BusConfig;
use switchboard_core::{LogName, Record};
use switchboard_storage::queries::accounts as account_rows;
use switchboard_test_utils::{MockDialer, MockServer, WAIT, test_bus_config};

const BOT: &str = r#"{"nick":"bot"}"#;

fn start(env: &Env, dialer: &Arc<MockDialer>) -> ManagerHandle {
    accounts::start(&test_bus_config(), env.store(), dialer.clone())
}

/// Reads a delivered message and returns the confirmation ping after it.
async fn expect_delivery(server: &mut MockServer, line: &str) -> String {
    assert_eq!(server.read_line().await, line);
    let ping = server.read_line().await;
    assert!(ping.starts_with("PING :sent:"), "not a confirmation: {ping}");
    ping
}

#[tokio::test]
async fn channels_are_joined_and_parted_until_echoed() {
    let env = Env::new().await;
    let dialer = Arc::new(MockDialer::new());
    env.add_account("one", BOT, &["#c1", "#c2"]).await;
    let manager = start(&env, &dialer);

    let mut server = dialer.next_server().await;
    assert_eq!(server.account, "one");
    assert_eq!(server.read_line().await, "JOIN #c1,#c2");
    server.echo("JOIN", "#c1,#c2");
    tokio::time::sleep(Duration::from_millis(50)).await;

    env.add_account("one", BOT, &["#c1", "#c3"]).await;
    manager.refresh().await.unwrap();
    assert_eq!(server.read_line().await, "JOIN #c3");
    assert_eq!(server.read_line().await, "PART #c2");

    // Not echoed yet: asked again on the next refresh.
    manager.refresh().await.unwrap();
    assert_eq!(server.read_line().await, "JOIN #c3");
    assert_eq!(server.read_line().await, "PART #c2");

    server.echo("JOIN", "#c3");
    server.echo("PART", "#c2");
    tokio::time::sleep(Duration::from_millis(50)).await;
    manager.refresh().await.unwrap();
    assert!(server.silent_for(Duration::from_millis(100)).await);

    manager.stop().await;
    assert_eq!(server.read_line().await, "QUIT :brb");
}

#[tokio::test]
async fn pending_messages_follow_the_join() {
    let env = Env::new().await;
    let dialer = Arc::new(MockDialer::new());
    env.add_account("one", BOT, &["#c1"]).await;
    env.outgoing(Record::message("one", "#c1", "", "queued")).await;
    env.outgoing(Record::message("two", "#c1", "", "other account"))
        .await;
    let manager = start(&env, &dialer);

    let mut server = dialer.next_server().await;
    assert_eq!(server.read_line().await, "JOIN #c1");
    expect_delivery(&mut server, "PRIVMSG #c1 :queued").await;
    assert!(server.silent_for(Duration::from_millis(100)).await);

    manager.stop().await;
}

#[tokio::test]
async fn confirmation_persists_the_delivered_position() {
    let env = Env::new().await;
    let dialer = Arc::new(MockDialer::new());
    env.add_account("one", BOT, &[]).await;
    let manager = start(&env, &dialer);
    let mut server = dialer.next_server().await;

    let id = env.outgoing(Record::message("one", "", "joe", "hi")).await;
    let ping = expect_delivery(&mut server, "PRIVMSG joe :hi").await;
    assert_eq!(ping, format!("PING :sent:{}", id.to_hex()));
    server.pong(&ping);

    env.wait_account_last_id("one", id).await;

    manager.stop().await;
}

#[tokio::test]
async fn unconfirmed_messages_are_resent_after_restart() {
    let env = Env::new().await;
    let dialer = Arc::new(MockDialer::new());
    env.add_account("one", BOT, &["#c1"]).await;
    let id = env.outgoing(Record::message("one", "#c1", "", "hello")).await;

    let manager = start(&env, &dialer);
    let mut server = dialer.next_server().await;
    assert_eq!(server.read_line().await, "JOIN #c1");
    expect_delivery(&mut server, "PRIVMSG #c1 :hello").await;
    manager.stop().await;
    assert_eq!(server.read_line().await, "QUIT :brb");

    let manager = start(&env, &dialer);
    let mut server = dialer.next_server().await;
    assert_eq!(server.read_line().await, "JOIN #c1");
    let ping = expect_delivery(&mut server, "PRIVMSG #c1 :hello").await;
    server.pong(&ping);
    env.wait_account_last_id("one", id).await;
    manager.stop().await;

    let manager = start(&env, &dialer);
    let mut server = dialer.next_server().await;
    assert_eq!(server.read_line().await, "JOIN #c1");
    assert!(server.silent_for(Duration::from_millis(150)).await);
    manager.stop().await;
}

#[tokio::test]
async fn oldest_unconfirmed_message_is_resent_first() {
    let env = Env::new().await;
    let dialer = Arc::new(MockDialer::new());
    env.add_account("one", BOT, &[]).await;
    let first = env.outgoing(Record::message("one", "#c1", "", "first")).await;
    env.outgoing(Record::message("one", "#c1", "", "second")).await;

    let manager = start(&env, &dialer);
    let mut server = dialer.next_server().await;
    let ping = expect_delivery(&mut server, "PRIVMSG #c1 :first").await;
    expect_delivery(&mut server, "PRIVMSG #c1 :second").await;
    server.pong(&ping);
    env.wait_account_last_id("one", first).await;
    manager.stop().await;
    assert_eq!(server.read_line().await, "QUIT :brb");

    env.outgoing(Record::message("one", "#c1", "", "third")).await;
    let manager = start(&env, &dialer);
    let mut server = dialer.next_server().await;
    expect_delivery(&mut server, "PRIVMSG #c1 :second").await;
    expect_delivery(&mut server, "PRIVMSG #c1 :third").await;
    assert!(server.silent_for(Duration::from_millis(100)).await);
    manager.stop().await;
}

#[tokio::test]
async fn stop_does_not_wait_for_a_stalled_connection() {
    let env = Env::new().await;
    let dialer = Arc::new(MockDialer::new());
    env.add_account("one", BOT, &[]).await;
    let manager = start(&env, &dialer);
    let mut server = dialer.next_server().await;
    server.stall();

    env.outgoing(Record::message("one", "#c1", "", "stuck")).await;
    assert_eq!(server.read_line().await, "PRIVMSG #c1 :stuck");

    tokio::time::timeout(WAIT, manager.stop())
        .await
        .expect("stop hung on a stalled connection");
    assert_eq!(server.read_line().await, "QUIT :brb");
}

#[tokio::test]
async fn stalled_writes_drop_the_connection() {
    let env = Env::new().await;
    let dialer = Arc::new(MockDialer::new());
    env.add_account("one", BOT, &[]).await;
    let config = BusConfig {
        send_timeout_ms: 100,
        ..test_bus_config()
    };
    let manager = accounts::start(&config, env.store(), dialer.clone());
    let mut first = dialer.next_server().await;
    first.stall();

    env.outgoing(Record::message("one", "#c1", "", "stuck")).await;
    assert_eq!(first.read_line().await, "PRIVMSG #c1 :stuck");

    let mut second = dialer.next_server().await;
    assert!(first.is_closed());
    let ping = expect_delivery(&mut second, "PRIVMSG #c1 :stuck").await;
    second.pong(&ping);

    // Channel updates go through again once the new session is up.
    env.add_account("one", BOT, &["#c2"]).await;
    tokio::time::timeout(WAIT, manager.refresh())
        .await
        .expect("refresh hung")
        .unwrap();
    assert_eq!(second.read_line().await, "JOIN #c2");

    manager.stop().await;
}

#[tokio::test]
async fn delivered_messages_are_echoed_into_the_incoming_log() {
    let env = Env::new().await;
    let dialer = Arc::new(MockDialer::new());
    env.add_account("one", BOT, &[]).await;
    let manager = start(&env, &dialer);
    let mut server = dialer.next_server().await;
    let mut incoming = env.reader(LogName::Incoming).await;

    env.outgoing(Record::message("one", "#c1", "", "said")).await;
    expect_delivery(&mut server, "PRIVMSG #c1 :said").await;

    let echo = incoming.next().await;
    assert_eq!(echo.text, "said");
    assert_eq!(echo.account, "one");
    assert!(echo.is_outgoing_echo());

    manager.stop().await;
}

#[tokio::test]
async fn inbound_records_are_appended_except_pongs() {
    let env = Env::new().await;
    let dialer = Arc::new(MockDialer::new());
    env.add_account("one", BOT, &[]).await;
    let manager = start(&env, &dialer);
    let server = dialer.next_server().await;
    let mut incoming = env.reader(LogName::Incoming).await;

    server.send(Record::pong("", "keepalive"));
    server.send(Record {
        account: String::new(),
        ..inbound("#c1", "joe", "hello bot")
    });

    let record = incoming.next().await;
    assert_eq!(record.account, "one");
    assert_eq!(record.nick, "joe");
    assert_eq!(record.text, "hello bot");
    assert!(incoming.silent_for(Duration::from_millis(100)).await);

    manager.stop().await;
}

#[tokio::test]
async fn lost_connections_are_redialed() {
    let env = Env::new().await;
    let dialer = Arc::new(MockDialer::new());
    env.add_account("one", BOT, &["#c1"]).await;
    let manager = start(&env, &dialer);

    let mut first = dialer.next_server().await;
    assert_eq!(first.read_line().await, "JOIN #c1");
    first.echo("JOIN", "#c1");
    first.close();

    let mut second = dialer.next_server().await;
    assert_eq!(second.read_line().await, "JOIN #c1");

    manager.stop().await;
    assert_eq!(second.read_line().await, "QUIT :brb");
}

#[tokio::test]
async fn failed_dials_are_retried() {
    let env = Env::new().await;
    let dialer = Arc::new(MockDialer::new());
    dialer.fail_next(2);
    env.add_account("one", BOT, &["#c1"]).await;
    let manager = start(&env, &dialer);

    let mut server = dialer.next_server().await;
    assert_eq!(dialer.dials(), 3);
    assert_eq!(server.read_line().await, "JOIN #c1");

    manager.stop().await;
}

#[tokio::test]
async fn changed_settings_reconnect_the_account() {
    let env = Env::new().await;
    let dialer = Arc::new(MockDialer::new());
    env.add_account("one", BOT, &[]).await;
    let manager = start(&env, &dialer);
    let mut old = dialer.next_server().await;
    assert_eq!(old.nick, "bot");

    env.add_account("one", r#"{"nick":"newbot"}"#, &[]).await;
    manager.refresh().await.unwrap();
    assert_eq!(old.read_line().await, "QUIT :brb");
    let new = dialer.next_server().await;
    assert_eq!(new.nick, "newbot");

    manager.stop().await;
}

#[tokio::test]
async fn removed_accounts_disconnect() {
    let env = Env::new().await;
    let dialer = Arc::new(MockDialer::new());
    env.add_account("one", BOT, &[]).await;
    env.add_account("two", BOT, &[]).await;
    let manager = start(&env, &dialer);
    let mut servers = vec![dialer.next_server().await, dialer.next_server().await];
    servers.sort_by(|a, b| a.account.cmp(&b.account));

    account_rows::delete_account(env.storage.db().unwrap(), "one")
        .await
        .unwrap();
    manager.refresh().await.unwrap();
    assert_eq!(servers[0].read_line().await, "QUIT :brb");
    assert!(servers[1].silent_for(Duration::from_millis(100)).await);
    assert!(dialer.no_dial_within(Duration::from_millis(100)).await);

    manager.stop().await;
    assert_eq!(servers[1].read_line().await, "QUIT :brb");
}

#[tokio::test]
async fn accounts_added_later_are_started_on_refresh() {
    let env = Env::new().await;
    let dialer = Arc::new(MockDialer::new());
    let manager = start(&env, &dialer);
    assert!(dialer.no_dial_within(Duration::from_millis(100)).await);

    env.add_account("late", BOT, &["#x"]).await;
    manager.refresh().await.unwrap();
    let mut server = dialer.next_server().await;
    assert_eq!(server.account, "late");
    assert_eq!(server.read_line().await, "JOIN #x");

    manager.stop().await;
    manager.stop().await;
}
