//! Application service: the hexagonal core.
//!
//! [`AppService`] owns the FSM and the device context.  It exposes a
//! hardware-agnostic API; all I/O flows through the port traits bundled
//! in [`Ports`], so the entire service is testable with sim adapters.
//!
//! ```text
//!  cloud inbox ──▶ ┌────────────────────────┐ ──▶ EventSink
//!                  │       AppService        │
//!  console call ──▶│  FSM · Upload · Console │ ──▶ publish (result/, notices)
//!                  └────────────────────────┘
//! ```

use core::fmt::Write as _;

use log::{debug, info, warn};

use crate::fsm::context::FsmContext;
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::upload::{ACK_TOPIC, AckOutcome};

use super::console::{ConsoleCommand, ConsoleVariables};
use super::events::AppEvent;
use super::ports::{EventSink, InboundMessage, Ports};

/// Inbound topic prefix for console calls.
pub const FUNCTION_PREFIX: &str = "function/";
/// Outbound topic prefix for console results.
pub const RESULT_PREFIX: &str = "result/";

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    fsm: Fsm,
    ctx: FsmContext,
    tick_count: u64,
}

impl Default for AppService {
    fn default() -> Self {
        Self::new()
    }
}

impl AppService {
    /// Construct the service.  Every run begins with the boot sequence in
    /// `Initialization`.
    ///
    /// Does **not** start the FSM; call [`start`](Self::start) next.
    pub fn new() -> Self {
        Self {
            fsm: Fsm::new(build_state_table(), StateId::Initialization),
            ctx: FsmContext::new(),
            tick_count: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, ports: &mut Ports<'_>, sink: &mut impl EventSink) {
        self.fsm.start(&mut self.ctx, ports);
        sink.emit(&AppEvent::Started(self.fsm.current_state()));
        info!("AppService started in {:?}", self.fsm.current_state());
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one cycle: inbound messages → FSM → events.
    pub fn tick(&mut self, ports: &mut Ports<'_>, sink: &mut impl EventSink) {
        self.tick_count += 1;
        let prev_state = self.fsm.current_state();

        // 1. Inbound cloud traffic
        while let Some(msg) = ports.link.poll_message() {
            self.route(&msg, ports);
        }

        // 2. FSM tick
        self.fsm.tick(&mut self.ctx, ports);

        // 3. Transition notice
        let new_state = self.fsm.current_state();
        if new_state != prev_state {
            self.ctx.emit(AppEvent::StateChanged {
                from: prev_state,
                to: new_state,
            });
            let mut msg: heapless::String<48> = heapless::String::new();
            let _ = write!(msg, "From {} to {}", prev_state.name(), new_state.name());
            self.ctx.notice(ports.link, "State Transition", &msg);
        }

        // 4. Drain queued events
        for event in self.ctx.outbox.iter() {
            sink.emit(event);
        }
        self.ctx.outbox.clear();
    }

    fn route(&mut self, msg: &InboundMessage, ports: &mut Ports<'_>) {
        if msg.topic.as_str() == ACK_TOPIC {
            self.on_acknowledgment(&msg.payload, ports);
        } else if let Some(name) = msg.topic.strip_prefix(FUNCTION_PREFIX) {
            let ok = self.call_function(name, &msg.payload, ports);
            self.publish_result(name, ok, ports);
        } else {
            debug!("Ignoring message on '{}'", msg.topic);
        }
    }

    fn on_acknowledgment(&mut self, payload: &str, ports: &mut Ports<'_>) {
        let outcome = self.ctx.upload.on_message(payload);
        match outcome {
            AckOutcome::Success { .. } => {
                self.ctx.notice(ports.link, "State", "Response Received");
            }
            AckOutcome::Failure { .. } => {
                self.ctx.notifier.publish(ports.link, "Ubidots Hook", payload);
                self.ctx.emit(AppEvent::AckWarning(outcome));
            }
            AckOutcome::NoData => {
                self.ctx.notifier.publish(ports.link, "Ubidots Hook", "No Data");
                self.ctx.emit(AppEvent::AckWarning(outcome));
            }
            AckOutcome::Unsolicited => {}
        }
    }

    fn publish_result(&mut self, name: &str, ok: bool, ports: &mut Ports<'_>) {
        if !ports.link.is_connected() {
            return;
        }
        let mut topic: heapless::String<64> = heapless::String::new();
        if write!(topic, "{}{}", RESULT_PREFIX, name).is_err() {
            warn!("Result topic too long for '{}'", name);
            return;
        }
        if let Err(e) = ports.link.publish(&topic, if ok { "1" } else { "0" }) {
            debug!("Result for '{}' not sent: {}", name, e);
        }
    }

    // ── Console ───────────────────────────────────────────────

    /// Run a named console function.  Returns `false` for an unknown name,
    /// a rejected argument, or a failed action.
    pub fn call_function(&mut self, name: &str, arg: &str, ports: &mut Ports<'_>) -> bool {
        let result = ConsoleCommand::parse(name, arg)
            .map_err(crate::error::Error::from)
            .and_then(|cmd| cmd.apply(&mut self.ctx, ports));
        let ok = match result {
            Ok(()) => {
                info!("Console {}({}) ok", name, arg);
                true
            }
            Err(e) => {
                warn!("Console {}({}) rejected: {}", name, arg, e);
                false
            }
        };
        let mut call_name = heapless::String::new();
        for ch in name.chars() {
            if call_name.push(ch).is_err() {
                break;
            }
        }
        self.ctx.emit(AppEvent::ConsoleCall { name: call_name, ok });
        ok
    }

    /// The console's read-only values.
    pub fn variables(&self) -> ConsoleVariables {
        ConsoleVariables::snapshot(&self.ctx)
    }

    // ── Queries ───────────────────────────────────────────────

    /// Current FSM state.
    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    /// Total service ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn context(&self) -> &FsmContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut FsmContext {
        &mut self.ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::TransportPort;
    use crate::testkit::SimRig;

    #[derive(Default)]
    struct Recorder(Vec<AppEvent>);

    impl EventSink for Recorder {
        fn emit(&mut self, event: &AppEvent) {
            self.0.push(event.clone());
        }
    }

    fn running() -> (SimRig, AppService, Recorder) {
        let mut rig = SimRig::new();
        rig.formatted_registers();
        let mut app = AppService::new();
        let mut sink = Recorder::default();
        app.start(&mut rig.ports(), &mut sink);
        app.tick(&mut rig.ports(), &mut sink);
        assert_eq!(app.state(), StateId::Idle);
        (rig, app, sink)
    }

    #[test]
    fn start_emits_initial_state() {
        let (_, _, sink) = running();
        assert_eq!(sink.0[0], AppEvent::Started(StateId::Initialization));
        assert!(sink.0.contains(&AppEvent::StateChanged {
            from: StateId::Initialization,
            to: StateId::Idle,
        }));
    }

    #[test]
    fn function_topic_runs_console_and_replies() {
        let (mut rig, mut app, mut sink) = running();
        rig.link.power_on();
        rig.link.connect(1_000).unwrap();
        rig.link.deliver("function/Set-OpenTime", "7");
        rig.link.deliver("function/Set-Close", "99");
        app.tick(&mut rig.ports(), &mut sink);
        assert_eq!(app.variables().open_time, 7);
        let results: Vec<_> = rig
            .link
            .published()
            .iter()
            .filter(|(t, _)| t.starts_with(RESULT_PREFIX))
            .cloned()
            .collect();
        assert_eq!(
            results,
            vec![
                ("result/Set-OpenTime".to_owned(), "1".to_owned()),
                ("result/Set-Close".to_owned(), "0".to_owned()),
            ]
        );
        assert!(sink.0.iter().any(|e| matches!(e, AppEvent::ConsoleCall { ok: false, .. })));
    }

    #[test]
    fn empty_acknowledgment_warns() {
        let (mut rig, mut app, mut sink) = running();
        rig.link.power_on();
        rig.link.connect(1_000).unwrap();
        rig.link.deliver(ACK_TOPIC, "");
        app.tick(&mut rig.ports(), &mut sink);
        assert!(sink.0.contains(&AppEvent::AckWarning(AckOutcome::NoData)));
        assert_eq!(rig.link.published_on("Ubidots Hook").next(), Some("No Data"));
    }

    #[test]
    fn verbose_mode_publishes_transitions() {
        let (mut rig, mut app, mut sink) = running();
        assert!(app.call_function("Verbose-Mode", "1", &mut rig.ports()));
        assert!(app.call_function("SendNow", "1", &mut rig.ports()));
        app.tick(&mut rig.ports(), &mut sink);
        assert_eq!(app.state(), StateId::Reporting);
        // Reporting brings the link up, so the second transition is visible.
        app.tick(&mut rig.ports(), &mut sink);
        assert_eq!(app.state(), StateId::ResponseWait);
        assert!(rig
            .link
            .published_on("State Transition")
            .any(|p| p == "From Reporting to Response Wait"));
    }

    #[test]
    fn quiet_mode_publishes_no_transitions() {
        let (mut rig, mut app, mut sink) = running();
        assert!(app.call_function("SendNow", "1", &mut rig.ports()));
        app.tick(&mut rig.ports(), &mut sink);
        app.tick(&mut rig.ports(), &mut sink);
        assert_eq!(rig.link.published_on("State Transition").count(), 0);
    }

    #[test]
    fn unknown_function_is_false() {
        let (mut rig, mut app, _) = running();
        assert!(!app.call_function("Reboot", "1", &mut rig.ports()));
        assert_eq!(app.tick_count(), 1);
    }
}
