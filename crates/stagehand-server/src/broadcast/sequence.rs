//! Timed sequence sender.
//!
//! Streams ordered danmaku batches to the viewer group with fixed pacing.
//! Each stream key holds at most one live flow; starting a new flow cancels
//! the previous one and waits for it to finish before spawning.

use super::fanout::{Broadcaster, Target};
use crate::config::Timing;
use crate::session::Connection;
use rand::seq::SliceRandom;
use rand::Rng;
use stagehand_core::template::fill_positional;
use stagehand_core::ServerMessage;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Independent broadcast streams. One live flow per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKey {
    AutoSend,
    WelcomeBoss,
    GiftThanks,
}

/// How one group of items is displayed.
#[derive(Debug, Clone)]
pub struct GroupSpec {
    pub label: String,
    pub duration_ms: u64,
    pub is_roast: bool,
}

impl GroupSpec {
    pub fn new(label: &str, duration_ms: u64) -> Self {
        Self {
            label: label.to_string(),
            duration_ms,
            is_roast: is_roast_label(label),
        }
    }
}

/// Base of a group's status tags: `{prefix}_{label}`, or just the prefix
/// when it already ends with the label (`send_boss_welcome_boss`).
pub fn group_tag(prefix: &str, label: &str) -> String {
    if prefix.ends_with(label) {
        prefix.to_string()
    } else {
        format!("{prefix}_{label}")
    }
}

/// Mock and roast groups get the roast styling on the overlay.
pub fn is_roast_label(label: &str) -> bool {
    label.eq_ignore_ascii_case("mock") || label.eq_ignore_ascii_case("roast")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupOutcome {
    Empty,
    Sent(usize),
    Cancelled(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowOutcome {
    Finished(usize),
    Cancelled,
}

/// A multi-group flow with controller status callbacks.
///
/// `context` prefixes every status tag, e.g. `auto_send` yields
/// `auto_send_started`, `auto_send_finished` and `auto_send_cancelled`.
#[derive(Debug, Clone)]
pub struct FlowPlan {
    pub context: String,
    pub title: String,
    pub groups: Vec<(GroupSpec, Vec<String>)>,
}

/// Raw templates for a two-half timed flow (boss welcome, gift thanks).
#[derive(Debug, Clone)]
pub struct TimedFlow {
    pub context: String,
    pub title: String,
    pub spec: GroupSpec,
    pub templates: Vec<String>,
    pub target_count: usize,
    /// Positional placeholder values, first slot first.
    pub names: Vec<String>,
    /// Per-slot values used where a name is blank or missing.
    pub fallbacks: Vec<String>,
}

pub struct SequenceSender {
    broadcaster: Arc<Broadcaster>,
    timing: Timing,
}

impl SequenceSender {
    pub fn new(broadcaster: Arc<Broadcaster>, timing: Timing) -> Self {
        Self {
            broadcaster,
            timing,
        }
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Sleep unless cancelled first. Returns false on cancellation.
    async fn pause(&self, duration: Duration, token: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = token.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    /// Broadcast one group to viewers, pacing items by the send interval.
    ///
    /// Blank entries are skipped. No pause follows the last item. The
    /// requester hears about group start and end, and about an empty group
    /// when `notify_empty` is set. Status tags start with `prefix`.
    pub async fn send_group(
        &self,
        prefix: &str,
        items: &[String],
        spec: &GroupSpec,
        requester: &Connection,
        notify_empty: bool,
        token: &CancellationToken,
    ) -> GroupOutcome {
        let valid: Vec<&str> = items
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        let label = spec.label.as_str();
        let tag = group_tag(prefix, label);

        if valid.is_empty() {
            info!(label, "no danmaku to send");
            if notify_empty {
                requester
                    .notify(ServerMessage::info(
                        format!("No {label} danmaku to send."),
                        None,
                        &format!("{tag}_empty"),
                    ))
                    .await;
            }
            return GroupOutcome::Empty;
        }

        requester
            .notify(ServerMessage::info(
                format!("Sending {} {label} danmaku...", valid.len()),
                None,
                &format!("{tag}_group"),
            ))
            .await;

        let mut sent = 0;
        for (i, text) in valid.iter().enumerate() {
            if token.is_cancelled() {
                return GroupOutcome::Cancelled(sent);
            }
            self.broadcaster
                .broadcast(
                    Target::Viewers,
                    ServerMessage::Danmaku {
                        text: (*text).to_string(),
                        duration_ms: spec.duration_ms,
                        is_roast: spec.is_roast,
                    },
                )
                .await;
            sent += 1;
            debug!(label, n = sent, duration_ms = spec.duration_ms, "danmaku sent");

            if i + 1 < valid.len() && !self.pause(self.timing.send_interval, token).await {
                return GroupOutcome::Cancelled(sent);
            }
        }

        info!(label, sent, "group finished");
        requester
            .notify(ServerMessage::info(
                format!("Sent {sent} {label} danmaku."),
                None,
                &format!("{tag}_group_done"),
            ))
            .await;
        GroupOutcome::Sent(sent)
    }

    /// Run a multi-group flow and always finish with the re-enable signal.
    pub async fn run_flow(
        &self,
        plan: FlowPlan,
        requester: Connection,
        token: CancellationToken,
    ) -> FlowOutcome {
        let ctx = plan.context.as_str();
        requester
            .notify(ServerMessage::info(
                format!("Starting {}...", plan.title),
                None,
                &format!("{ctx}_starting"),
            ))
            .await;
        requester
            .notify(ServerMessage::AutoSendStarted {
                message: format!("{} started.", plan.title),
                context: format!("{ctx}_started"),
            })
            .await;

        let outcome = self.run_groups(&plan, &requester, &token).await;
        match outcome {
            FlowOutcome::Finished(sent) => {
                info!(context = ctx, sent, "flow finished");
                requester
                    .notify(ServerMessage::AutoSendFinished {
                        message: format!("{} finished.", plan.title),
                        context: format!("{ctx}_finished"),
                    })
                    .await;
            }
            FlowOutcome::Cancelled => {
                info!(context = ctx, "flow cancelled");
                requester
                    .notify(ServerMessage::info(
                        format!("{} cancelled.", plan.title),
                        None,
                        &format!("{ctx}_cancelled"),
                    ))
                    .await;
            }
        }
        requester.notify(ServerMessage::ReEnableAutoSendButtons).await;
        outcome
    }

    async fn run_groups(
        &self,
        plan: &FlowPlan,
        requester: &Connection,
        token: &CancellationToken,
    ) -> FlowOutcome {
        let groups: Vec<&(GroupSpec, Vec<String>)> = plan
            .groups
            .iter()
            .filter(|(_, items)| items.iter().any(|s| !s.trim().is_empty()))
            .collect();

        let mut total = 0;
        for (i, (spec, items)) in groups.iter().enumerate() {
            match self.send_group(&plan.context, items, spec, requester, true, token).await {
                GroupOutcome::Cancelled(_) => return FlowOutcome::Cancelled,
                GroupOutcome::Sent(n) => total += n,
                GroupOutcome::Empty => {}
            }
            if i + 1 < groups.len() && !self.pause(self.timing.group_pause, token).await {
                return FlowOutcome::Cancelled;
            }
        }
        FlowOutcome::Finished(total)
    }

    /// Prepare a template batch, split it in halves and send both halves
    /// with the group pause between them.
    pub async fn run_timed_flow(
        &self,
        flow: TimedFlow,
        requester: Connection,
        token: CancellationToken,
    ) -> FlowOutcome {
        let names: Vec<&str> = flow.names.iter().map(String::as_str).collect();
        let fallbacks: Vec<&str> = flow.fallbacks.iter().map(String::as_str).collect();
        let batch = prepare_batch(
            flow.templates,
            flow.target_count,
            &names,
            &fallbacks,
            &mut rand::thread_rng(),
        );
        let (first, second) = split_halves(batch);
        debug!(context = %flow.context, first = first.len(), second = second.len(), "timed flow prepared");

        let plan = FlowPlan {
            context: flow.context,
            title: flow.title,
            groups: vec![(flow.spec.clone(), first), (flow.spec, second)],
        };
        self.run_flow(plan, requester, token).await
    }
}

/// Deduplicate, sample or cycle to `target` items, and fill placeholders.
///
/// A `target` of zero keeps every unique template.
pub fn prepare_batch<R: Rng + ?Sized>(
    templates: Vec<String>,
    target: usize,
    names: &[&str],
    fallbacks: &[&str],
    rng: &mut R,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut unique: Vec<String> = templates
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect();
    if unique.is_empty() {
        return unique;
    }

    unique.shuffle(rng);
    let target = if target == 0 { unique.len() } else { target };
    let picked: Vec<&String> = unique.iter().cycle().take(target).collect();

    picked
        .into_iter()
        .map(|t| fill_positional(t, names, fallbacks))
        .collect()
}

/// First half gets `len / 2` items, second half the rest.
pub fn split_halves(mut items: Vec<String>) -> (Vec<String>, Vec<String>) {
    let second = items.split_off(items.len() / 2);
    (items, second)
}

/// How long a superseded flow gets to wind down before it is aborted.
pub const RETIRE_TIMEOUT: Duration = Duration::from_secs(3);

struct RunningFlow {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl RunningFlow {
    /// Cancel and wait up to [`RETIRE_TIMEOUT`]. A flow stuck on a stalled
    /// requester is aborted so it cannot hold the stream.
    async fn retire(mut self, key: StreamKey) {
        self.token.cancel();
        match tokio::time::timeout(RETIRE_TIMEOUT, &mut self.handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(stream = ?key, error = %e, "previous sequence ended abnormally"),
            Err(_) => {
                warn!(stream = ?key, "previous sequence did not stop in time, aborting");
                self.handle.abort();
            }
        }
    }
}

/// Cancellable flow handles keyed by stream.
#[derive(Default)]
pub struct SequenceSlots {
    slots: Mutex<HashMap<StreamKey, RunningFlow>>,
}

impl SequenceSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the flow on `key`: cancel the old one, wait for it (bounded),
    /// then spawn the new one. Concurrent starts are serialized by the slot
    /// lock.
    pub async fn start<F, Fut>(&self, key: StreamKey, make: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slots = self.slots.lock().await;
        if let Some(prev) = slots.remove(&key) {
            if !prev.handle.is_finished() {
                info!(stream = ?key, "superseding in-flight sequence");
            }
            prev.retire(key).await;
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(make(token.clone()));
        slots.insert(key, RunningFlow { token, handle });
    }

    /// Cancel and await the flow on `key`. Returns whether one was running.
    pub async fn cancel(&self, key: StreamKey) -> bool {
        let prev = self.slots.lock().await.remove(&key);
        match prev {
            Some(flow) => {
                let was_running = !flow.handle.is_finished();
                flow.retire(key).await;
                was_running
            }
            None => false,
        }
    }

    pub async fn cancel_all(&self) {
        let flows: Vec<(StreamKey, RunningFlow)> = self.slots.lock().await.drain().collect();
        for (key, flow) in flows {
            flow.retire(key).await;
        }
    }

    pub async fn is_running(&self, key: StreamKey) -> bool {
        self.slots
            .lock()
            .await
            .get(&key)
            .is_some_and(|f| !f.handle.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimingSection;
    use crate::session::connection::drain_messages;
    use crate::session::SessionRegistry;
    use crate::transport::websocket::Outgoing;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use stagehand_core::{ClientRole, Envelope};
    use tokio::sync::mpsc;

    fn texts(msgs: &[Envelope]) -> Vec<String> {
        msgs.iter()
            .filter_map(|e| match &e.message {
                ServerMessage::Danmaku { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    fn contexts(msgs: &[Envelope]) -> Vec<String> {
        msgs.iter()
            .filter_map(|e| match &e.message {
                ServerMessage::Info(n) => Some(n.context.clone()),
                ServerMessage::AutoSendStarted { context, .. }
                | ServerMessage::AutoSendFinished { context, .. } => Some(context.clone()),
                ServerMessage::ReEnableAutoSendButtons => Some("re_enable".to_string()),
                _ => None,
            })
            .collect()
    }

    struct Rig {
        sender: Arc<SequenceSender>,
        controller: Connection,
        controller_rx: mpsc::Receiver<Outgoing>,
        viewer_rx: mpsc::Receiver<Outgoing>,
    }

    async fn rig() -> Rig {
        let registry = Arc::new(SessionRegistry::new());
        let (viewer, viewer_rx) = Connection::channel_pair(1);
        let (controller, controller_rx) = Connection::channel_pair(2);
        registry.register(&viewer, ClientRole::Viewer).await;
        registry.register(&controller, ClientRole::Controller).await;
        let timing = Timing::from(&TimingSection {
            send_interval_ms: 100,
            group_pause_ms: 300,
            auto_send_duration_ms: 1000,
            boss_duration_ms: 2000,
            roast_duration_ms: 800,
        });
        let sender = Arc::new(SequenceSender::new(
            Arc::new(Broadcaster::new(registry)),
            timing,
        ));
        Rig {
            sender,
            controller,
            controller_rx,
            viewer_rx,
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn group_skips_blanks_and_paces_items() {
        let mut rig = rig().await;
        let token = CancellationToken::new();
        let spec = GroupSpec::new("welcome", 1000);
        let start = tokio::time::Instant::now();
        let outcome = rig
            .sender
            .send_group("auto_send", &strings(&["a", "  ", "b", "c"]), &spec, &rig.controller, true, &token)
            .await;
        assert_eq!(outcome, GroupOutcome::Sent(3));
        // Two gaps between three items, none after the last.
        assert_eq!(start.elapsed(), Duration::from_millis(200));
        assert_eq!(texts(&drain_messages(&mut rig.viewer_rx)), strings(&["a", "b", "c"]));
        assert_eq!(
            contexts(&drain_messages(&mut rig.controller_rx)),
            strings(&["auto_send_welcome_group", "auto_send_welcome_group_done"])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn empty_group_notifies_requester() {
        let mut rig = rig().await;
        let token = CancellationToken::new();
        let spec = GroupSpec::new("mock", 1000);
        let outcome = rig
            .sender
            .send_group("auto_send", &strings(&["", " "]), &spec, &rig.controller, true, &token)
            .await;
        assert_eq!(outcome, GroupOutcome::Empty);
        assert_eq!(
            contexts(&drain_messages(&mut rig.controller_rx)),
            strings(&["auto_send_mock_empty"])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn boss_groups_carry_the_flow_prefix() {
        let mut rig = rig().await;
        let flow = TimedFlow {
            context: "send_boss_welcome_boss".into(),
            title: "Boss welcome".into(),
            spec: GroupSpec::new("welcome_boss", 2000),
            templates: strings(&["欢迎{}", "你好{}"]),
            target_count: 2,
            names: strings(&["张总"]),
            fallbacks: strings(&["大哥"]),
        };
        rig.sender
            .run_timed_flow(flow, rig.controller.clone(), CancellationToken::new())
            .await;
        let ctx = contexts(&drain_messages(&mut rig.controller_rx));
        assert!(ctx.contains(&"send_boss_welcome_boss_group".to_string()));
        assert!(ctx.contains(&"send_boss_welcome_boss_group_done".to_string()));
        assert!(ctx.iter().all(|c| !c.starts_with("auto_send")), "{ctx:?}");
    }

    #[test]
    fn group_tags_do_not_repeat_the_label() {
        assert_eq!(group_tag("auto_send", "mock"), "auto_send_mock");
        assert_eq!(group_tag("send_boss_thanks_boss_gift", "thanks_boss_gift"), "send_boss_thanks_boss_gift");
    }

    #[test]
    fn roast_styling_follows_label() {
        assert!(GroupSpec::new("mock", 1).is_roast);
        assert!(GroupSpec::new("Roast", 1).is_roast);
        assert!(!GroupSpec::new("welcome", 1).is_roast);
    }

    #[tokio::test(start_paused = true)]
    async fn flow_reports_lifecycle_and_reenables() {
        let mut rig = rig().await;
        let plan = FlowPlan {
            context: "auto_send".into(),
            title: "Auto-send".into(),
            groups: vec![
                (GroupSpec::new("welcome", 1000), strings(&["w1", "w2"])),
                (GroupSpec::new("mock", 1000), strings(&["m1"])),
            ],
        };
        let outcome = rig
            .sender
            .run_flow(plan, rig.controller.clone(), CancellationToken::new())
            .await;
        assert_eq!(outcome, FlowOutcome::Finished(3));

        let viewer = drain_messages(&mut rig.viewer_rx);
        assert_eq!(texts(&viewer), strings(&["w1", "w2", "m1"]));
        let mock_is_roast = viewer.iter().any(|e| {
            matches!(&e.message, ServerMessage::Danmaku { text, is_roast: true, .. } if text == "m1")
        });
        assert!(mock_is_roast);

        let ctx = contexts(&drain_messages(&mut rig.controller_rx));
        assert_eq!(ctx.first().map(String::as_str), Some("auto_send_starting"));
        assert!(ctx.contains(&"auto_send_finished".to_string()));
        assert_eq!(ctx.last().map(String::as_str), Some("re_enable"));
    }

    #[tokio::test(start_paused = true)]
    async fn new_flow_supersedes_old_before_first_item() {
        let mut rig = rig().await;
        let slots = SequenceSlots::new();

        let (sender, ctrl) = (rig.sender.clone(), rig.controller.clone());
        slots
            .start(StreamKey::WelcomeBoss, move |token| async move {
                let plan = FlowPlan {
                    context: "first".into(),
                    title: "First".into(),
                    groups: vec![(GroupSpec::new("welcome", 1000), strings(&["a1", "a2", "a3", "a4"]))],
                };
                sender.run_flow(plan, ctrl, token).await;
            })
            .await;

        // a1 at t=0, a2 at t=100; cancel lands while waiting for a3.
        tokio::time::sleep(Duration::from_millis(150)).await;

        let (sender, ctrl) = (rig.sender.clone(), rig.controller.clone());
        slots
            .start(StreamKey::WelcomeBoss, move |token| async move {
                let plan = FlowPlan {
                    context: "second".into(),
                    title: "Second".into(),
                    groups: vec![(GroupSpec::new("welcome", 1000), strings(&["b1", "b2"]))],
                };
                sender.run_flow(plan, ctrl, token).await;
            })
            .await;

        let before_second = texts(&drain_messages(&mut rig.viewer_rx));
        assert_eq!(before_second, strings(&["a1", "a2"]));
        let ctx = contexts(&drain_messages(&mut rig.controller_rx));
        assert!(ctx.contains(&"first_cancelled".to_string()));
        assert!(ctx.contains(&"re_enable".to_string()));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(texts(&drain_messages(&mut rig.viewer_rx)), strings(&["b1", "b2"]));
        assert!(!slots.is_running(StreamKey::WelcomeBoss).await);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_requester_does_not_block_the_next_controller() {
        let mut rig = rig().await;
        let slots = SequenceSlots::new();

        // Controller A stops reading: its queue is full.
        let (stalled, _stalled_rx) = Connection::channel_pair(3);
        stalled.stall();
        let sender = rig.sender.clone();
        slots
            .start(StreamKey::WelcomeBoss, move |token| async move {
                let plan = FlowPlan {
                    context: "stalled".into(),
                    title: "Stalled".into(),
                    groups: vec![(GroupSpec::new("welcome", 1000), strings(&["s1", "s2"]))],
                };
                sender.run_flow(plan, stalled, token).await;
            })
            .await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let (sender, ctrl) = (rig.sender.clone(), rig.controller.clone());
        let t0 = tokio::time::Instant::now();
        let started = tokio::time::timeout(
            Duration::from_secs(60),
            slots.start(StreamKey::WelcomeBoss, move |token| async move {
                let plan = FlowPlan {
                    context: "fresh".into(),
                    title: "Fresh".into(),
                    groups: vec![(GroupSpec::new("welcome", 1000), strings(&["b1"]))],
                };
                sender.run_flow(plan, ctrl, token).await;
            }),
        )
        .await;
        assert!(started.is_ok(), "second controller blocked behind a stalled one");
        assert!(t0.elapsed() <= RETIRE_TIMEOUT);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(texts(&drain_messages(&mut rig.viewer_rx)).contains(&"b1".to_string()));
        let ctx = contexts(&drain_messages(&mut rig.controller_rx));
        assert!(ctx.contains(&"fresh_finished".to_string()));
        assert!(!slots.is_running(StreamKey::WelcomeBoss).await);
    }

    #[tokio::test(start_paused = true)]
    async fn streams_are_independent() {
        let rig = rig().await;
        let slots = SequenceSlots::new();
        for key in [StreamKey::WelcomeBoss, StreamKey::GiftThanks] {
            let (sender, ctrl) = (rig.sender.clone(), rig.controller.clone());
            slots
                .start(key, move |token| async move {
                    let plan = FlowPlan {
                        context: "x".into(),
                        title: "X".into(),
                        groups: vec![(GroupSpec::new("welcome", 1000), strings(&["1", "2", "3"]))],
                    };
                    sender.run_flow(plan, ctrl, token).await;
                })
                .await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(slots.is_running(StreamKey::WelcomeBoss).await);
        assert!(slots.is_running(StreamKey::GiftThanks).await);
        assert!(slots.cancel(StreamKey::GiftThanks).await);
        assert!(slots.is_running(StreamKey::WelcomeBoss).await);
        slots.cancel_all().await;
        assert!(!slots.is_running(StreamKey::WelcomeBoss).await);
    }

    #[test]
    fn batch_dedupes_and_cycles_to_target() {
        let mut rng = StdRng::seed_from_u64(7);
        let batch = prepare_batch(strings(&["欢迎{}", "欢迎{}", "  ", "你好{}"]), 5, &["老板"], &["大哥"], &mut rng);
        assert_eq!(batch.len(), 5);
        assert!(batch.iter().all(|t| t == "欢迎老板" || t == "你好老板"));
        assert!(batch.contains(&"欢迎老板".to_string()));
        assert!(batch.contains(&"你好老板".to_string()));
    }

    #[test]
    fn batch_samples_down_without_repeats() {
        let mut rng = StdRng::seed_from_u64(1);
        let templates: Vec<String> = (0..30).map(|i| format!("t{i}")).collect();
        let batch = prepare_batch(templates, 10, &[], &["大哥"], &mut rng);
        assert_eq!(batch.len(), 10);
        let unique: HashSet<_> = batch.iter().collect();
        assert_eq!(unique.len(), 10);
    }

    #[test]
    fn batch_of_nothing_is_empty() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(prepare_batch(strings(&["", " "]), 10, &[], &[], &mut rng).is_empty());
    }

    #[test]
    fn halves_put_extra_item_second() {
        let (a, b) = split_halves(strings(&["1", "2", "3"]));
        assert_eq!(a, strings(&["1"]));
        assert_eq!(b, strings(&["2", "3"]));
        let (a, b) = split_halves(strings(&["1"]));
        assert!(a.is_empty());
        assert_eq!(b.len(), 1);
    }
}
