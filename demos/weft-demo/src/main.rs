//! Headless weft demo
//!
//! Exercises the peer engine end-to-end against an in-process
//! "transport" — a shared log of sealed byte buffers standing in for
//! the relay server and WebSocket link spec.md places out of core
//! scope. No network, no terminal UI: just enough plumbing to prove
//! that independently mutating engines converge.
//!
//! Usage:
//!   weft-demo --scenario concurrent-insert
//!   weft-demo --scenario out-of-order --verbose

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use weft_crypto::ChannelKey;
use weft_sync::Engine;
use weft_types::{ChannelId, PeerId};

#[derive(Parser, Debug)]
#[command(name = "weft-demo")]
#[command(about = "Headless multi-peer simulation of the weft collaborative-editing engine")]
struct Args {
    /// Which end-to-end scenario to run.
    #[arg(short, long, value_enum, default_value_t = Scenario::ConcurrentInsert)]
    scenario: Scenario,

    /// Seal every message with a random channel key instead of
    /// exchanging plaintext frames.
    #[arg(long)]
    sealed: bool,

    /// Enable verbose debug logging.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Scenario {
    /// S1: a single peer typing a short string.
    SinglePeer,
    /// S2: two peers concurrently inserting at the head, converging on
    /// a peerID tie-break.
    ConcurrentInsert,
    /// S3: a second op is delivered before its causal predecessor.
    OutOfOrder,
    /// S4/S5: concurrent delete-vs-insert, then a save/restore round
    /// trip onto a fresh engine.
    DeleteAndRestore,
}

/// A relay stand-in: assigns monotonic offsets and fans every message
/// out to every other registered peer, mirroring `SubscribeToChannel`
/// /`ReceiveMessage` from spec.md §6 without any real networking.
struct Hub {
    next_offset: i64,
}

impl Hub {
    fn new() -> Self {
        Self { next_offset: 0 }
    }

    fn assign_offset(&mut self) -> i64 {
        let offset = self.next_offset;
        self.next_offset += 1;
        offset
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!(scenario = ?args.scenario, sealed = args.sealed, "starting weft-demo");

    match args.scenario {
        Scenario::SinglePeer => run_single_peer(args.sealed),
        Scenario::ConcurrentInsert => run_concurrent_insert(args.sealed),
        Scenario::OutOfOrder => run_out_of_order(args.sealed),
        Scenario::DeleteAndRestore => run_delete_and_restore(args.sealed),
    }
}

fn new_channel_pair(sealed: bool) -> (ChannelId, Option<ChannelKey>) {
    let channel = ChannelId::generate();
    let key = sealed.then(ChannelKey::generate);
    (channel, key)
}

fn new_peer(channel: ChannelId, key: &Option<ChannelKey>) -> Engine {
    let mut engine = Engine::new_peer(PeerId::generate(), channel);
    if let Some(key) = key {
        engine = engine.with_channel_key(key.clone());
    }
    engine
}

fn run_single_peer(sealed: bool) -> Result<()> {
    let (channel, key) = new_channel_pair(sealed);
    let mut peer = new_peer(channel, &key);

    peer.insert_char(0, 'h');
    peer.insert_char(1, 'i');
    info!(document = %peer.document(), "S1: single peer typed");

    let payload = peer
        .encode_message()?
        .context("expected a pending message after local edits")?;
    info!(bytes = payload.len(), log_len = peer.message_log_len(), "encoded outgoing message");
    Ok(())
}

fn run_concurrent_insert(sealed: bool) -> Result<()> {
    let (channel, key) = new_channel_pair(sealed);
    let mut hub = Hub::new();
    let mut a = new_peer(channel, &key);
    let mut b = new_peer(channel, &key);

    a.insert_char(0, 'a');
    b.insert_char(0, 'b');

    let msg_a = a.encode_message()?.context("a has a pending edit")?;
    let msg_b = b.encode_message()?.context("b has a pending edit")?;
    let offset_a = hub.assign_offset();
    let offset_b = hub.assign_offset();

    b.receive_message(a.local_peer_id(), 1, offset_a, msg_a)?;
    a.receive_message(b.local_peer_id(), 1, offset_b, msg_b)?;

    info!(
        a_document = %a.document(),
        b_document = %b.document(),
        "S2: concurrent inserts converged"
    );
    assert_eq!(a.document(), b.document(), "peers must converge");
    Ok(())
}

fn run_out_of_order(sealed: bool) -> Result<()> {
    let (channel, key) = new_channel_pair(sealed);
    let mut hub = Hub::new();
    let mut a = new_peer(channel, &key);
    let mut b = new_peer(channel, &key);

    a.insert_char(0, 'x');
    let op1 = a.encode_message()?.context("a has a pending edit")?;
    let offset1 = hub.assign_offset();

    a.insert_char(1, 'y');
    let op2 = a.encode_message()?.context("a has a pending edit")?;
    let offset2 = hub.assign_offset();

    info!("delivering op2 (senderSeq=2) before op1 (senderSeq=1)");
    match b.receive_message(a.local_peer_id(), 2, offset2, op2.clone()) {
        Ok(()) => unreachable!("a sequence gap must be rejected, never silently buffered"),
        Err(err) => info!(error = %err, "rejected as expected"),
    }

    b.receive_message(a.local_peer_id(), 1, offset1, op1)?;
    b.receive_message(a.local_peer_id(), 2, offset2, op2)?;
    info!(document = %b.document(), "S3: caught up after filling the gap");
    assert_eq!(b.document(), "xy");
    Ok(())
}

fn run_delete_and_restore(sealed: bool) -> Result<()> {
    let (channel, key) = new_channel_pair(sealed);
    let mut hub = Hub::new();
    let mut a = new_peer(channel, &key);
    let mut b = new_peer(channel, &key);

    a.insert_char(0, 'a');
    a.insert_char(1, 'b');
    a.insert_char(2, 'c');
    let seed = a.encode_message()?.context("a has pending edits")?;
    let offset = hub.assign_offset();
    b.receive_message(a.local_peer_id(), 1, offset, seed)?;
    info!(document = %b.document(), "seeded both peers with \"abc\"");

    // Concurrent: A deletes the middle character while B inserts after it.
    a.delete_char(1);
    b.insert_char(2, 'Z');
    let del = a.encode_message()?.context("a has a pending delete")?;
    let ins = b.encode_message()?.context("b has a pending insert")?;
    let del_offset = hub.assign_offset();
    let ins_offset = hub.assign_offset();

    b.receive_message(a.local_peer_id(), 2, del_offset, del)?;
    a.receive_message(b.local_peer_id(), 1, ins_offset, ins)?;

    info!(
        a_document = %a.document(),
        b_document = %b.document(),
        "S4: concurrent delete/insert converged"
    );
    assert_eq!(a.document(), b.document());

    let snapshot = b.save()?;
    let restored = Engine::load(&snapshot)?;
    info!(document = %restored.document(), "S5: restored from snapshot");
    assert_eq!(restored.document(), b.document());

    Ok(())
}
