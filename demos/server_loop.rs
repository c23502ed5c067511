//! A toy request server that swaps its request handler while serving.
//!
//! Workers block on their inbox between requests. The hooks wake blocked
//! workers of a lagging priority so they reach a quiescence point; the engine
//! installs the next handler; each worker starts using it after migrating.
//!
//! Run with: `cargo run --example server_loop`

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use wfpatch::{
    ApplyError, Config, Hooks, LogWriter, PatchEngine, PatchRequest, Patcher, Phase, Priority,
    Subscribe, wf_log,
};

type Handler = fn(u64) -> String;

fn handle_v0(req: u64) -> String {
    format!("hello #{req}")
}

fn handle_v1(req: u64) -> String {
    format!("HELLO #{req} (patched)")
}

enum Msg {
    Request(u64),
    Wake,
    Stop,
}

/// Handler table indexed by patch version.
struct Handlers(RwLock<Vec<Handler>>);

struct Engine(Arc<Handlers>);

impl PatchEngine for Engine {
    fn apply(&self, request: &PatchRequest) -> Result<(), ApplyError> {
        let handler = match request.payload().as_str() {
            "handler-v1" => handle_v1,
            other => return Err(ApplyError::new(format!("unknown handler {other}"))),
        };
        let mut table = self.0.0.write();
        if table.len() as u64 != request.version() {
            return Err(ApplyError::new("handler table out of step"));
        }
        table.push(handler);
        Ok(())
    }
}

#[derive(Default)]
struct Kicker {
    inboxes: Mutex<Vec<(Priority, Sender<Msg>)>>,
}

impl Kicker {
    fn wake(&self, priority: Priority) -> bool {
        let inboxes = self.inboxes.lock();
        inboxes
            .iter()
            .filter(|(p, _)| *p == priority)
            .all(|(_, tx)| tx.send(Msg::Wake).is_ok())
    }
}

impl Hooks for Kicker {
    fn trigger_global_quiescence(&self, priority: Priority) -> bool {
        self.wake(priority)
    }

    fn trigger_local_quiescence(&self, priority: Priority) -> bool {
        self.wake(priority)
    }

    fn thread_migrated(&self, remaining: usize) {
        wf_log!("migrated, {remaining} to go");
    }

    fn patch_done(&self, request: &PatchRequest) {
        wf_log!("all workers run patch {}", request.version());
    }
}

fn main() -> anyhow::Result<()> {
    let cfg = Config {
        trigger_sleep: Duration::from_millis(5),
        ..Config::default()
    };

    let handlers = Arc::new(Handlers(RwLock::new(vec![handle_v0 as Handler])));
    let kicker = Arc::new(Kicker::default());
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];

    let patcher = Patcher::builder(cfg)
        .with_hooks(kicker.clone())
        .with_engine(Arc::new(Engine(Arc::clone(&handlers))))
        .with_subscribers(subs)
        .build()?;

    let mut inboxes = Vec::new();
    let mut workers = Vec::new();
    for (i, priority) in [Priority::LOW, Priority::MEDIUM, Priority::HIGH]
        .into_iter()
        .enumerate()
    {
        let (tx, rx) = mpsc::channel::<Msg>();
        kicker.inboxes.lock().push((priority, tx.clone()));
        inboxes.push(tx);

        let patcher = Arc::clone(&patcher);
        let handlers = Arc::clone(&handlers);
        workers.push(
            thread::Builder::new()
                .name(format!("worker-{i}"))
                .spawn(move || -> Result<(), wfpatch::PatchError> {
                    patcher.thread_birth(&format!("worker-{i}"))?;
                    patcher.thread_set_priority(priority)?;
                    loop {
                        // Between requests nothing references the handler.
                        patcher.quiescence();
                        match rx.recv_timeout(Duration::from_millis(500)) {
                            Ok(Msg::Request(n)) => {
                                let version = patcher.registry().local().map_or(0, |r| r.version());
                                let handler = handlers.0.read()[version as usize];
                                wf_log!("{}", handler(n));
                            }
                            Ok(Msg::Wake) | Err(RecvTimeoutError::Timeout) => {}
                            Ok(Msg::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                        }
                    }
                    patcher.thread_death()
                })?,
        );
    }

    for n in 0..6 {
        let _ = inboxes[n as usize % inboxes.len()].send(Msg::Request(n));
        thread::sleep(Duration::from_millis(20));
    }

    patcher.set_patch("handler-v1");
    patcher.signal_patching();

    while patcher.active_version() < 1 || patcher.phase() != Phase::Idle {
        thread::sleep(Duration::from_millis(10));
    }
    if let Some(report) = patcher.last_cycle() {
        wf_log!(
            "cycle {} finished: {:?}, quiescence latency {:?}s",
            report.request.version(),
            report.outcome,
            report.quiescence_latency()
        );
    }

    for n in 6..12 {
        let _ = inboxes[n as usize % inboxes.len()].send(Msg::Request(n));
        thread::sleep(Duration::from_millis(20));
    }

    for tx in &inboxes {
        let _ = tx.send(Msg::Stop);
    }
    for w in workers {
        match w.join() {
            Ok(res) => res?,
            Err(_) => anyhow::bail!("worker panicked"),
        }
    }

    patcher.shutdown();
    Ok(())
}
