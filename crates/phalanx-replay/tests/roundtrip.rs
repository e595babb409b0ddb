//! Record live pipelines, play the recordings back, and compare.

use std::io::Cursor;
use std::net::SocketAddr;

use phalanx_core::{Command, FactionId, UpdateNumber};
use phalanx_pipeline::{CheatFilter, CommandPipeline, Entry, UpdateOutcome};
use phalanx_replay::{ReplayHeader, ReplayPlayer, ReplayReader, ReplayRecorder, ReplayWriter};
use phalanx_sync::{CommandSynchronizer, MemoryNetwork, SyncConfig};
use phalanx_test_utils::{
    attack_cmd, cheat_cmd, init_logging, message_cmd, move_cmd, stop_cmd, MockSimulation,
    ScriptedCommander, SharedBuffer,
};

// ── Helpers ─────────────────────────────────────────────────────

fn header() -> ReplayHeader {
    ReplayHeader::new(1234, ["red", "blue"])
}

fn recorder(sink: &SharedBuffer) -> Box<ReplayRecorder<SharedBuffer>> {
    Box::new(ReplayRecorder::new(
        ReplayWriter::new(sink.clone(), &header()).unwrap(),
    ))
}

/// Run `updates` ticks, returning each tick's outcome.
fn run(pipeline: &mut CommandPipeline, sim: &mut MockSimulation, updates: u32) -> Vec<UpdateOutcome> {
    (0..updates)
        .map(|_| pipeline.update(sim, 0.05).unwrap())
        .collect()
}

/// Play a recording through a bare pipeline for `updates` ticks.
fn play(recording: Vec<u8>, updates: u32) -> (Vec<UpdateOutcome>, MockSimulation) {
    let reader = ReplayReader::open(Cursor::new(recording)).unwrap();
    assert_eq!(reader.header(), &header());

    let mut pipeline = CommandPipeline::new();
    pipeline
        .push_filter(Box::new(ReplayPlayer::new(reader).unwrap()))
        .unwrap();
    let mut sim = MockSimulation::new();
    let outcomes = run(&mut pipeline, &mut sim, updates);
    (outcomes, sim)
}

fn addr(faction: u8) -> SocketAddr {
    SocketAddr::from(([192, 168, 1, faction + 1], 9000))
}

// ── Local pipeline ──────────────────────────────────────────────

#[test]
fn recorded_local_match_replays_identically() {
    init_logging();
    let sink = SharedBuffer::new();

    let mut pipeline = CommandPipeline::new();
    pipeline.push_filter(Box::new(CheatFilter::new())).unwrap();
    pipeline.push_filter(recorder(&sink)).unwrap();
    pipeline
        .add_commander(
            Box::new(
                ScriptedCommander::new(FactionId(0))
                    .at(0, move_cmd(0, &[1, 2], 10, 10))
                    .at(2, cheat_cmd(0, "money"))
                    .at(4, attack_cmd(0, &[1], 40)),
            ),
            Entry::Head,
        )
        .unwrap();
    pipeline
        .add_commander(
            Box::new(
                ScriptedCommander::new(FactionId(1))
                    .at(0, stop_cmd(1, &[7]))
                    .at(6, message_cmd(1, "gl hf")),
            ),
            Entry::Head,
        )
        .unwrap();

    let mut live = MockSimulation::new();
    let live_outcomes = run(&mut pipeline, &mut live, 10);
    pipeline.shutdown().unwrap();

    // The cheat never reached the recorder.
    assert_eq!(live.executed().len(), 4);

    let (replayed_outcomes, replayed) = play(sink.contents(), 10);
    assert_eq!(replayed.executed(), live.executed());
    assert_eq!(replayed_outcomes, live_outcomes);
}

#[test]
fn recording_survives_an_idle_match() {
    let sink = SharedBuffer::new();
    let mut pipeline = CommandPipeline::new();
    pipeline.push_filter(recorder(&sink)).unwrap();
    run(&mut pipeline, &mut MockSimulation::new(), 5);
    pipeline.shutdown().unwrap();

    let reader = ReplayReader::open(Cursor::new(sink.contents())).unwrap();
    assert_eq!(reader.events().count(), 0);
}

#[test]
fn injected_commands_are_recorded_at_their_update() {
    let sink = SharedBuffer::new();
    let mut pipeline = CommandPipeline::new();
    let stage = pipeline.push_filter(recorder(&sink)).unwrap();
    let mut sim = MockSimulation::new();

    run(&mut pipeline, &mut sim, 3);
    pipeline
        .submit(Entry::Stage(stage), message_cmd(0, "ping"))
        .unwrap();
    run(&mut pipeline, &mut sim, 1);

    let events: Vec<_> = ReplayReader::open(Cursor::new(sink.contents()))
        .unwrap()
        .events()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].update, UpdateNumber(3));
}

// ── Networked match ─────────────────────────────────────────────

#[test]
fn lockstep_peers_record_the_same_replay() {
    init_logging();
    let net = MemoryNetwork::new();
    let scripts: [Vec<(u32, Command)>; 2] = [
        vec![(0, move_cmd(0, &[1], 3, 3)), (3, stop_cmd(0, &[1]))],
        vec![(1, attack_cmd(1, &[5], 1))],
    ];

    let mut peers = Vec::new();
    for (faction, script) in (0u8..).zip(scripts) {
        let mut sync = CommandSynchronizer::new(
            SyncConfig::with_target(2),
            net.bind(addr(faction)).unwrap(),
            FactionId(faction),
        )
        .unwrap();
        sync.add_peer(FactionId(1 - faction), addr(1 - faction))
            .unwrap();

        let mut commander = ScriptedCommander::new(FactionId(faction));
        for (call, command) in script {
            commander = commander.at(call, command);
        }

        let sink = SharedBuffer::new();
        let mut pipeline = CommandPipeline::new();
        pipeline.push_filter(Box::new(sync)).unwrap();
        pipeline.push_filter(recorder(&sink)).unwrap();
        pipeline
            .add_commander(Box::new(commander), Entry::Head)
            .unwrap();
        peers.push((pipeline, MockSimulation::new(), sink));
    }

    for _ in 0..12 {
        for (pipeline, sim, _) in &mut peers {
            pipeline.update(sim, 0.05).unwrap();
        }
    }
    for (pipeline, _, _) in &mut peers {
        pipeline.shutdown().unwrap();
    }

    let (_, sim_a, sink_a) = &peers[0];
    let (_, sim_b, sink_b) = &peers[1];
    assert_eq!(sim_a.executed().len(), 3);
    assert_eq!(sim_a.executed(), sim_b.executed());
    assert_eq!(sink_a.contents(), sink_b.contents());

    let (_, replayed) = play(sink_a.contents(), 12);
    assert_eq!(replayed.executed(), sim_a.executed());
}
