use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use shadelink_api::{DeviceIdentity, DeviceStatus, HostPosition, POSITION_TOLERANCE, ProtocolPosition};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::errors::{CommandError, MovementError};
use crate::services::schedule::PollSchedule;
use crate::services::telemetry::StatusEvent;

const REQUEST_QUEUE_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MotionState {
    Decreasing,
    Increasing,
    #[default]
    Stopped,
}

impl MotionState {
    /// Direction of travel needed to get from `reference` to `target`
    pub fn toward(reference: HostPosition, target: HostPosition) -> Self {
        if target > reference {
            MotionState::Increasing
        } else {
            MotionState::Decreasing
        }
    }

    /// Whether `reading` moves strictly onward from `position` in this direction
    pub fn progresses(self, position: HostPosition, reading: HostPosition) -> bool {
        match self {
            MotionState::Increasing => reading > position,
            MotionState::Decreasing => reading < position,
            MotionState::Stopped => false,
        }
    }
}

/// What the host sees for one covering, in host units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoveringState {
    pub position: HostPosition,
    pub target: HostPosition,
    pub motion: MotionState,
}

impl CoveringState {
    pub fn at_rest(position: HostPosition) -> Self {
        Self {
            position,
            target: position,
            motion: MotionState::Stopped,
        }
    }
}

impl fmt::Display for CoveringState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({:?})", self.position, self.target, self.motion)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerPhase {
    Idle,
    Moving,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Band for "target reached" and "stop requested"
    pub tolerance: u8,
    /// Deadline for a command to be confirmed by a reading
    pub movement_timeout: Duration,
    /// Delay before the status query that follows a stop
    pub stop_refresh_delay: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            tolerance: POSITION_TOLERANCE,
            movement_timeout: Duration::from_secs(90),
            stop_refresh_delay: Duration::from_millis(500),
        }
    }
}

/// Device operations a tracker needs, in protocol units
#[async_trait]
pub trait CoveringControl: Send + Sync {
    async fn set_position(
        &self,
        device: &DeviceIdentity,
        position: ProtocolPosition,
    ) -> Result<DeviceStatus, CommandError>;

    async fn stop(&self, device: &DeviceIdentity) -> Result<DeviceStatus, CommandError>;

    async fn query_status(&self, device: &DeviceIdentity) -> Result<DeviceStatus, CommandError>;
}

/// Receives every change of a covering's displayed values
pub trait HostNotifier: Send + Sync {
    fn covering_changed(&self, device: &DeviceIdentity, state: CoveringState);
}

/// Timers of the command in progress, dropped together when it ends
#[derive(Debug)]
struct ActiveCommand {
    direction: MotionState,
    started: Instant,
    deadline: Instant,
    schedule: PollSchedule,
    next_poll: Option<Instant>,
}

impl ActiveCommand {
    fn new(direction: MotionState, started: Instant, timeout: Duration) -> Self {
        let mut schedule = PollSchedule::new();
        let next_poll = schedule.next().map(|offset| started + offset);

        Self {
            direction,
            started,
            deadline: started + timeout,
            schedule,
            next_poll,
        }
    }

    fn next_wakeup(&self) -> Instant {
        self.next_poll
            .map_or(self.deadline, |poll| poll.min(self.deadline))
    }

    /// Moves past every tick due at `now`, returns whether one was due
    fn take_due_poll(&mut self, now: Instant) -> bool {
        if !self.next_poll.is_some_and(|poll| poll <= now) {
            return false;
        }

        let started = self.started;
        self.next_poll = self
            .schedule
            .by_ref()
            .map(|offset| started + offset)
            .find(|poll| *poll > now);

        true
    }
}

/// Reconciles commanded targets with the readings a device reports.
///
/// Device readings are unreliable while a covering moves, so while a command
/// is in progress only readings that reach the target or progress in the
/// commanded direction are shown. Polls follow a decaying schedule and a
/// deadline forces the tracker back to idle if the device never confirms.
pub struct MovementTracker {
    device: DeviceIdentity,
    control: Arc<dyn CoveringControl>,
    notifier: Arc<dyn HostNotifier>,
    config: TrackerConfig,
    confirmed: HostPosition,
    displayed: CoveringState,
    active: Option<ActiveCommand>,
    refresh_at: Option<Instant>,
}

impl MovementTracker {
    pub fn new(
        device: DeviceIdentity,
        control: Arc<dyn CoveringControl>,
        notifier: Arc<dyn HostNotifier>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            device,
            control,
            notifier,
            config,
            confirmed: HostPosition::default(),
            displayed: CoveringState::default(),
            active: None,
            refresh_at: None,
        }
    }

    pub fn device(&self) -> &DeviceIdentity {
        &self.device
    }

    pub fn state(&self) -> CoveringState {
        self.displayed
    }

    pub fn confirmed(&self) -> HostPosition {
        self.confirmed
    }

    pub fn phase(&self) -> TrackerPhase {
        match self.active {
            Some(_) => TrackerPhase::Moving,
            None => TrackerPhase::Idle,
        }
    }

    pub async fn set_target(&mut self, target: HostPosition) -> Result<(), MovementError> {
        let tolerance = self.config.tolerance;

        if self.active.is_some() {
            if target.within(self.displayed.position, tolerance) {
                self.stop_in_place();
                return Ok(());
            }

            info!(device = %self.device, "Redirecting to {}", target);
            self.active = None;
            if let Err(e) = self.control.stop(&self.device).await {
                warn!(device = %self.device, "Stop before redirect failed: {}", e);
            }

            return self.begin_command(self.displayed.position, target).await;
        }

        if target.within(self.confirmed, tolerance) {
            debug!(device = %self.device, "Already at {}, nothing to do", target);
            return Ok(());
        }

        self.begin_command(self.confirmed, target).await
    }

    async fn begin_command(
        &mut self,
        reference: HostPosition,
        target: HostPosition,
    ) -> Result<(), MovementError> {
        let direction = MotionState::toward(reference, target);

        self.refresh_at = None;
        self.active = Some(ActiveCommand::new(
            direction,
            Instant::now(),
            self.config.movement_timeout,
        ));
        self.update_display(CoveringState {
            position: self.displayed.position,
            target,
            motion: direction,
        });

        info!(device = %self.device, "Moving from {} to {}", reference, target);

        match self
            .control
            .set_position(&self.device, target.to_protocol())
            .await
        {
            Ok(_) => Ok(()),
            Err(source) => {
                self.active = None;
                self.update_display(CoveringState::at_rest(self.displayed.position));

                let error = MovementError::Command {
                    mac: self.device.mac.clone(),
                    source,
                };
                warn!("{}", error);
                Err(error)
            }
        }
    }

    /// Ends the command where the covering is shown to be. `confirmed` keeps
    /// its old value until the refresh reading lands.
    fn stop_in_place(&mut self) {
        self.active = None;
        self.update_display(CoveringState::at_rest(self.displayed.position));
        self.refresh_at = Some(Instant::now() + self.config.stop_refresh_delay);

        info!(device = %self.device, "Stopping at {}", self.displayed.position);

        let control = self.control.clone();
        let device = self.device.clone();
        tokio::spawn(async move {
            if let Err(e) = control.stop(&device).await {
                warn!(device = %device, "Stop failed: {}", e);
            }
        });
    }

    pub fn apply_reading(&mut self, status: &DeviceStatus) {
        let Some(reading) = status.current_position.map(ProtocolPosition::to_host) else {
            return;
        };

        let Some(active) = &self.active else {
            self.confirmed = reading;
            self.update_display(CoveringState::at_rest(reading));
            return;
        };

        if reading.within(self.displayed.target, self.config.tolerance) {
            self.active = None;
            self.confirmed = reading;
            self.update_display(CoveringState::at_rest(reading));
            info!(device = %self.device, "Reached {}", reading);
        } else if active.direction.progresses(self.displayed.position, reading) {
            self.update_display(CoveringState {
                position: reading,
                ..self.displayed
            });
        } else {
            debug!(device = %self.device, "Ignoring reading {} against {:?}", reading, active.direction);
        }
    }

    /// Earliest instant at which `on_timer` has work to do
    pub fn next_wakeup(&self) -> Option<Instant> {
        let command = self.active.as_ref().map(ActiveCommand::next_wakeup);

        match (command, self.refresh_at) {
            (Some(command), Some(refresh)) => Some(command.min(refresh)),
            (command, refresh) => command.or(refresh),
        }
    }

    pub fn on_timer(&mut self, now: Instant) {
        if self.refresh_at.is_some_and(|at| at <= now) {
            self.refresh_at = None;
            self.spawn_query();
        }

        let Some(active) = self.active.as_mut() else {
            return;
        };

        if active.deadline <= now {
            self.expire();
        } else if active.take_due_poll(now) {
            self.spawn_query();
        }
    }

    fn expire(&mut self) {
        self.active = None;

        warn!(
            "{}",
            MovementError::Timeout {
                mac: self.device.mac.clone(),
                after: self.config.movement_timeout,
            }
        );

        self.update_display(CoveringState::at_rest(self.displayed.position));
        self.spawn_query();
    }

    /// The reading comes back through telemetry
    fn spawn_query(&self) {
        let control = self.control.clone();
        let device = self.device.clone();

        tokio::spawn(async move {
            if let Err(e) = control.query_status(&device).await {
                warn!(device = %device, "Status query failed: {}", e);
            }
        });
    }

    fn update_display(&mut self, state: CoveringState) {
        if state == self.displayed {
            return;
        }

        self.displayed = state;
        self.notifier.covering_changed(&self.device, state);
    }

    /// Runs the tracker as a task fed by `telemetry` and the returned handle
    pub fn spawn(self, telemetry: broadcast::Receiver<StatusEvent>) -> (TrackerHandle, JoinHandle<()>) {
        let (sender, requests) = mpsc::channel(REQUEST_QUEUE_SIZE);
        let handle = TrackerHandle {
            device: self.device.clone(),
            sender,
        };

        (handle, tokio::spawn(self.run(requests, telemetry)))
    }

    async fn run(
        mut self,
        mut requests: mpsc::Receiver<TrackerRequest>,
        mut telemetry: broadcast::Receiver<StatusEvent>,
    ) {
        let mut telemetry_open = true;

        loop {
            let wakeup = self.next_wakeup();

            tokio::select! {
                request = requests.recv() => match request {
                    Some(TrackerRequest::SetTarget { target, reply }) => {
                        let result = self.set_target(target).await;
                        let _ = reply.send(result);
                    }
                    Some(TrackerRequest::State { reply }) => {
                        let _ = reply.send(self.displayed);
                    }
                    None => break,
                },
                event = telemetry.recv(), if telemetry_open => match event {
                    Ok(event) => self.apply_reading(&event.status),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(device = %self.device, skipped, "Tracker fell behind on readings");
                    }
                    Err(broadcast::error::RecvError::Closed) => telemetry_open = false,
                },
                _ = sleep_until(wakeup.unwrap_or_else(Instant::now)), if wakeup.is_some() => {
                    self.on_timer(Instant::now());
                }
            }
        }

        debug!(device = %self.device, "Tracker stopped");
    }
}

enum TrackerRequest {
    SetTarget {
        target: HostPosition,
        reply: oneshot::Sender<Result<(), MovementError>>,
    },
    State {
        reply: oneshot::Sender<CoveringState>,
    },
}

/// Cloneable access to a running tracker
#[derive(Debug, Clone)]
pub struct TrackerHandle {
    device: DeviceIdentity,
    sender: mpsc::Sender<TrackerRequest>,
}

impl TrackerHandle {
    pub fn device(&self) -> &DeviceIdentity {
        &self.device
    }

    pub async fn set_target(&self, target: HostPosition) -> Result<(), MovementError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(TrackerRequest::SetTarget { target, reply })
            .await
            .map_err(|_| self.closed())?;

        response.await.map_err(|_| self.closed())?
    }

    pub async fn state(&self) -> Result<CoveringState, MovementError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(TrackerRequest::State { reply })
            .await
            .map_err(|_| self.closed())?;

        response.await.map_err(|_| self.closed())
    }

    fn closed(&self) -> MovementError {
        MovementError::TrackerClosed(self.device.mac.clone())
    }
}

impl fmt::Debug for TrackerRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerRequest::SetTarget { target, .. } => write!(f, "SetTarget({target})"),
            TrackerRequest::State { .. } => f.write_str("State"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use shadelink_api::MessageKind;

    use super::*;
    use crate::errors::TransportError;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        SetPosition(ProtocolPosition),
        Stop,
        Query,
    }

    #[derive(Default)]
    struct RecordingControl {
        calls: Mutex<Vec<Call>>,
        fail_set_position: bool,
    }

    impl RecordingControl {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, call: Call) -> usize {
            self.calls().into_iter().filter(|c| *c == call).count()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl CoveringControl for RecordingControl {
        async fn set_position(
            &self,
            _device: &DeviceIdentity,
            position: ProtocolPosition,
        ) -> Result<DeviceStatus, CommandError> {
            self.record(Call::SetPosition(position));
            if self.fail_set_position {
                return Err(CommandError::Transport(TransportError::RequestTimeout {
                    expected: MessageKind::WriteDeviceAck,
                    timeout: Duration::from_secs(5),
                }));
            }
            Ok(DeviceStatus::default())
        }

        async fn stop(&self, _device: &DeviceIdentity) -> Result<DeviceStatus, CommandError> {
            self.record(Call::Stop);
            Ok(DeviceStatus::default())
        }

        async fn query_status(&self, _device: &DeviceIdentity) -> Result<DeviceStatus, CommandError> {
            self.record(Call::Query);
            Ok(DeviceStatus::default())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        states: Mutex<Vec<CoveringState>>,
    }

    impl HostNotifier for RecordingNotifier {
        fn covering_changed(&self, _device: &DeviceIdentity, state: CoveringState) {
            self.states.lock().unwrap().push(state);
        }
    }

    fn device() -> DeviceIdentity {
        DeviceIdentity::new("f008d1e4f1a80001", "10000000", "Living room")
    }

    fn tracker_with(control: Arc<RecordingControl>) -> (MovementTracker, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let tracker = MovementTracker::new(device(), control, notifier.clone(), TrackerConfig::default());
        (tracker, notifier)
    }

    fn reading(protocol: u8) -> DeviceStatus {
        DeviceStatus::at_position(ProtocolPosition::new(protocol))
    }

    fn host(value: u8) -> HostPosition {
        HostPosition::new(value)
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_motion_direction() {
        assert_eq!(MotionState::toward(host(0), host(100)), MotionState::Increasing);
        assert_eq!(MotionState::toward(host(80), host(20)), MotionState::Decreasing);

        assert!(MotionState::Increasing.progresses(host(10), host(11)));
        assert!(!MotionState::Increasing.progresses(host(10), host(10)));
        assert!(MotionState::Decreasing.progresses(host(10), host(9)));
        assert!(!MotionState::Stopped.progresses(host(10), host(90)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_regression_and_completion() {
        let control = Arc::new(RecordingControl::default());
        let (mut tracker, notifier) = tracker_with(control.clone());
        tracker.apply_reading(&reading(100));
        assert_eq!(tracker.confirmed(), host(0));

        tracker.set_target(host(100)).await.unwrap();
        assert_eq!(control.calls(), vec![Call::SetPosition(ProtocolPosition::new(0))]);
        assert_eq!(tracker.state().motion, MotionState::Increasing);
        assert_eq!(tracker.phase(), TrackerPhase::Moving);

        tracker.apply_reading(&reading(70));
        assert_eq!(tracker.state().position, host(30));

        tracker.apply_reading(&reading(100));
        assert_eq!(tracker.state().position, host(30));

        tracker.apply_reading(&reading(2));
        assert_eq!(tracker.state(), CoveringState::at_rest(host(98)));
        assert_eq!(tracker.confirmed(), host(98));
        assert_eq!(tracker.phase(), TrackerPhase::Idle);
        assert_eq!(tracker.next_wakeup(), None);

        assert_eq!(
            notifier.states.lock().unwrap().last(),
            Some(&CoveringState::at_rest(host(98)))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_target_near_displayed_position_stops() {
        let control = Arc::new(RecordingControl::default());
        let (mut tracker, _notifier) = tracker_with(control.clone());

        tracker.set_target(host(100)).await.unwrap();
        tracker.apply_reading(&reading(40));
        assert_eq!(tracker.state().position, host(60));

        tracker.set_target(host(61)).await.unwrap();
        settle().await;

        assert_eq!(
            control.calls(),
            vec![Call::SetPosition(ProtocolPosition::new(0)), Call::Stop]
        );
        assert_eq!(tracker.state(), CoveringState::at_rest(host(60)));
        assert_eq!(tracker.phase(), TrackerPhase::Idle);

        tokio::time::advance(Duration::from_millis(500)).await;
        tracker.on_timer(Instant::now());
        settle().await;

        assert_eq!(control.count(Call::Query), 1);
        assert_eq!(tracker.next_wakeup(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_trusts_readings() {
        let control = Arc::new(RecordingControl::default());
        let (mut tracker, _notifier) = tracker_with(control.clone());

        tracker.apply_reading(&reading(60));
        assert_eq!(tracker.confirmed(), host(40));

        tracker.apply_reading(&reading(58));
        assert_eq!(tracker.confirmed(), host(42));
        assert_eq!(tracker.state(), CoveringState::at_rest(host(42)));
        assert!(control.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_target_within_tolerance_is_ignored() {
        let control = Arc::new(RecordingControl::default());
        let (mut tracker, notifier) = tracker_with(control.clone());
        tracker.apply_reading(&reading(60));
        let notified = notifier.states.lock().unwrap().len();

        tracker.set_target(host(41)).await.unwrap();

        assert!(control.calls().is_empty());
        assert_eq!(tracker.phase(), TrackerPhase::Idle);
        assert_eq!(notifier.states.lock().unwrap().len(), notified);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_position_waits_for_reading_after_stop() {
        let control = Arc::new(RecordingControl::default());
        let (mut tracker, _notifier) = tracker_with(control.clone());

        tracker.set_target(host(100)).await.unwrap();
        tracker.apply_reading(&reading(40));
        tracker.set_target(host(60)).await.unwrap();
        settle().await;
        assert_eq!(tracker.state(), CoveringState::at_rest(host(60)));
        assert_eq!(tracker.confirmed(), host(0));

        // Still matches the last confirmed position
        tracker.set_target(host(0)).await.unwrap();
        assert_eq!(control.count(Call::SetPosition(ProtocolPosition::new(100))), 0);
        assert_eq!(tracker.phase(), TrackerPhase::Idle);
        assert_eq!(tracker.state(), CoveringState::at_rest(host(60)));

        tracker.apply_reading(&reading(40));
        assert_eq!(tracker.confirmed(), host(60));

        tracker.set_target(host(0)).await.unwrap();
        assert_eq!(control.count(Call::SetPosition(ProtocolPosition::new(100))), 1);
        assert_eq!(tracker.state().motion, MotionState::Decreasing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_redirect_stops_then_commands() {
        let control = Arc::new(RecordingControl::default());
        let (mut tracker, _notifier) = tracker_with(control.clone());

        tracker.set_target(host(100)).await.unwrap();
        tracker.apply_reading(&reading(70));
        tracker.set_target(host(10)).await.unwrap();

        assert_eq!(
            control.calls(),
            vec![
                Call::SetPosition(ProtocolPosition::new(0)),
                Call::Stop,
                Call::SetPosition(ProtocolPosition::new(90)),
            ]
        );
        assert_eq!(
            tracker.state(),
            CoveringState {
                position: host(30),
                target: host(10),
                motion: MotionState::Decreasing,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_command_reverts_to_idle() {
        let control = Arc::new(RecordingControl {
            fail_set_position: true,
            ..RecordingControl::default()
        });
        let (mut tracker, notifier) = tracker_with(control.clone());
        tracker.apply_reading(&reading(80));

        let result = tracker.set_target(host(90)).await;

        assert!(matches!(result, Err(MovementError::Command { .. })));
        assert_eq!(tracker.state(), CoveringState::at_rest(host(20)));
        assert_eq!(tracker.phase(), TrackerPhase::Idle);
        assert_eq!(tracker.next_wakeup(), None);
        assert_eq!(
            notifier.states.lock().unwrap().last(),
            Some(&CoveringState::at_rest(host(20)))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_issues_one_corrective_query() {
        let control = Arc::new(RecordingControl::default());
        let (tracker, _notifier) = tracker_with(control.clone());
        let (_telemetry, receiver) = broadcast::channel(16);
        let (handle, _task) = tracker.spawn(receiver);

        handle.set_target(host(100)).await.unwrap();

        tokio::time::sleep(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(control.count(Call::Query), PollSchedule::len());
        assert_eq!(handle.state().await.unwrap().motion, MotionState::Increasing);

        tokio::time::sleep(Duration::from_secs(35)).await;
        settle().await;
        assert_eq!(control.count(Call::Query), PollSchedule::len() + 1);
        assert_eq!(handle.state().await.unwrap(), CoveringState::at_rest(host(0)));

        tokio::time::sleep(Duration::from_secs(120)).await;
        settle().await;
        assert_eq!(control.count(Call::Query), PollSchedule::len() + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_cancels_timers() {
        let control = Arc::new(RecordingControl::default());
        let (tracker, _notifier) = tracker_with(control.clone());
        let (telemetry, receiver) = broadcast::channel(16);
        let (handle, _task) = tracker.spawn(receiver);

        handle.set_target(host(100)).await.unwrap();
        telemetry
            .send(StatusEvent::new(
                device().mac,
                MessageKind::Report,
                reading(0),
            ))
            .unwrap();
        settle().await;

        assert_eq!(handle.state().await.unwrap(), CoveringState::at_rest(host(100)));

        tokio::time::sleep(Duration::from_secs(200)).await;
        settle().await;
        assert_eq!(control.count(Call::Query), 0);
    }

    #[tokio::test]
    async fn test_handle_reports_closed_tracker() {
        let control = Arc::new(RecordingControl::default());
        let (tracker, _notifier) = tracker_with(control);
        let (_telemetry, receiver) = broadcast::channel(16);
        let (handle, task) = tracker.spawn(receiver);

        task.abort();
        let _ = task.await;

        assert!(matches!(
            handle.set_target(host(50)).await,
            Err(MovementError::TrackerClosed(_))
        ));
    }
}
