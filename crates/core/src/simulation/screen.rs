//! Simulated screen implementing both host ports.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use regex_lite::Regex;
use tokio::time::Instant;
use tracing::debug;

use super::scene::{ElementLabel, Reaction, Scene, SceneElement, ScreenSize};
use crate::port::{ActionPort, PortError, RecognitionPort};
use crate::signature::{Location, Offset, Pattern, Signature};

/// A click recorded for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedClick {
    /// Clicked point.
    pub point: (i32, i32),
    /// Label key of the element under the point, if any.
    pub target: Option<String>,
}

/// A key press recorded for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedKey {
    pub key: String,
    pub hold: Duration,
}

#[derive(Debug, Clone)]
struct Placed {
    label: ElementLabel,
    location: Location,
    visible_from: Instant,
    visible_until: Option<Instant>,
}

impl Placed {
    fn new(element: &SceneElement, base: Instant) -> Self {
        let visible_from = base + Duration::from_millis(element.appear_after_ms);
        Self {
            label: element.label.clone(),
            location: element.location,
            visible_from,
            visible_until: element
                .vanish_after_ms
                .map(|ms| visible_from + Duration::from_millis(ms)),
        }
    }

    fn is_visible(&self, now: Instant) -> bool {
        now >= self.visible_from && self.visible_until.is_none_or(|until| now < until)
    }

    fn contains(&self, point: (i32, i32)) -> bool {
        let loc = &self.location;
        point.0 >= loc.x
            && point.0 <= loc.x + loc.width as i32
            && point.1 >= loc.y
            && point.1 <= loc.y + loc.height as i32
    }
}

#[derive(Debug, Default)]
struct SimState {
    elements: Vec<Placed>,
    reactions: Vec<Reaction>,
    clicks: Vec<RecordedClick>,
    keys: Vec<RecordedKey>,
    held: HashSet<String>,
    background: bool,
    faulty: HashSet<String>,
    rejected_clicks: u32,
    probes: HashMap<String, u32>,
    patterns: HashMap<String, Vec<Regex>>,
}

/// Scripted screen.
///
/// Provides controllable behavior for rehearsals and tests:
/// - Elements that appear and vanish on a timeline
/// - Reactions to clicks and key presses
/// - Recording of every click and key press
/// - Injected recognition faults, rejected clicks and a background window
#[derive(Debug)]
pub struct SimulatedScreen {
    screen: ScreenSize,
    state: Mutex<SimState>,
}

impl Default for SimulatedScreen {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedScreen {
    /// Empty 1920x1080 screen.
    pub fn new() -> Self {
        Self {
            screen: ScreenSize::default(),
            state: Mutex::new(SimState::default()),
        }
    }

    /// Screen populated from a scene script. Timeline offsets count from now.
    pub fn from_scene(scene: Scene) -> Self {
        let sim = Self {
            screen: scene.screen,
            state: Mutex::new(SimState::default()),
        };
        {
            let now = Instant::now();
            let mut state = sim.lock();
            state.elements = scene.elements.iter().map(|e| Placed::new(e, now)).collect();
            state.reactions = scene.reactions;
        }
        sim
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Adds an element, honoring its appear and vanish delays.
    pub fn show(&self, element: SceneElement) {
        let placed = Placed::new(&element, Instant::now());
        self.lock().elements.push(placed);
    }

    /// Hides every element with the given label key.
    pub fn hide(&self, key: &str) {
        let now = Instant::now();
        let mut state = self.lock();
        for element in state.elements.iter_mut() {
            if element.label.key() == key && element.visible_until.is_none_or(|u| u > now) {
                element.visible_until = Some(now);
            }
        }
    }

    pub fn add_reaction(&self, reaction: Reaction) {
        self.lock().reactions.push(reaction);
    }

    /// Makes recognition of the signature with this id fail with a host fault.
    pub fn fail_recognition_of(&self, signature_id: impl Into<String>) {
        self.lock().faulty.insert(signature_id.into());
    }

    /// Rejects the next `count` clicks.
    pub fn reject_clicks(&self, count: u32) {
        self.lock().rejected_clicks = count;
    }

    /// Simulates the game window losing or regaining focus.
    pub fn set_foreground(&self, foreground: bool) {
        self.lock().background = !foreground;
    }

    pub fn clicks(&self) -> Vec<RecordedClick> {
        self.lock().clicks.clone()
    }

    /// Clicks that landed on an element with this label key.
    pub fn clicks_on(&self, key: &str) -> usize {
        self.lock()
            .clicks
            .iter()
            .filter(|c| c.target.as_deref() == Some(key))
            .count()
    }

    pub fn keys(&self) -> Vec<RecordedKey> {
        self.lock().keys.clone()
    }

    /// Number of `recognize` calls for the signature with this id.
    pub fn probe_count(&self, signature_id: &str) -> u32 {
        self.lock().probes.get(signature_id).copied().unwrap_or(0)
    }

    /// Label keys visible right now.
    pub fn visible(&self) -> Vec<String> {
        let now = Instant::now();
        self.lock()
            .elements
            .iter()
            .filter(|e| e.is_visible(now))
            .map(|e| e.label.key().to_string())
            .collect()
    }

    fn matches(state: &mut SimState, signature: &Signature, label: &ElementLabel) -> bool {
        match (&signature.pattern, label) {
            (Pattern::Feature { name }, ElementLabel::Feature(feature)) => name == feature,
            (Pattern::Text { .. }, ElementLabel::Text(text)) => {
                let compiled = state
                    .patterns
                    .entry(signature.id.clone())
                    .or_insert_with(|| signature.compile_text().unwrap_or_default());
                compiled.iter().any(|re| re.is_match(text))
            }
            _ => false,
        }
    }

    fn fire(state: &mut SimState, trigger: impl Fn(&Reaction) -> bool, now: Instant) {
        let visible: HashSet<String> = state
            .elements
            .iter()
            .filter(|e| e.is_visible(now))
            .map(|e| e.label.key().to_string())
            .collect();

        let fired: Vec<Reaction> = state
            .reactions
            .iter()
            .filter(|r| trigger(r))
            .filter(|r| r.when_visible.as_ref().is_none_or(|k| visible.contains(k)))
            .cloned()
            .collect();

        for reaction in fired {
            let at = now + Duration::from_millis(reaction.after_ms);
            for key in &reaction.hide {
                for element in state.elements.iter_mut() {
                    if element.label.key() == key && element.visible_until.is_none_or(|u| u > at) {
                        element.visible_until = Some(at);
                    }
                }
            }
            for element in &reaction.show {
                state.elements.push(Placed::new(element, at));
            }
            debug!(
                hide = ?reaction.hide,
                show = reaction.show.len(),
                "Simulated screen reacted"
            );
        }
    }
}

#[async_trait]
impl RecognitionPort for SimulatedScreen {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn recognize(&self, signature: &Signature) -> Result<Option<Location>, PortError> {
        let now = Instant::now();
        let screen = (self.screen.width, self.screen.height);
        let mut state = self.lock();
        *state.probes.entry(signature.id.clone()).or_insert(0) += 1;

        if state.faulty.contains(&signature.id) {
            return Err(PortError::Fault(format!(
                "recognizer failed on '{}'",
                signature.id
            )));
        }

        let candidates: Vec<(ElementLabel, Location)> = state
            .elements
            .iter()
            .filter(|e| e.is_visible(now))
            .filter(|e| {
                signature
                    .region
                    .is_none_or(|r| r.contains(e.location.center(), screen))
            })
            .map(|e| (e.label.clone(), e.location))
            .collect();

        for (label, location) in candidates {
            if Self::matches(&mut state, signature, &label) {
                return Ok(Some(location));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl ActionPort for SimulatedScreen {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn click_at(&self, location: Location, offset: Option<Offset>) -> Result<(), PortError> {
        let now = Instant::now();
        let point = location.target(offset);
        let mut state = self.lock();

        if state.rejected_clicks > 0 {
            state.rejected_clicks -= 1;
            return Err(PortError::InputRejected(format!(
                "click at {:?} ignored",
                point
            )));
        }

        let target = state
            .elements
            .iter()
            .rev()
            .find(|e| e.is_visible(now) && e.contains(point))
            .map(|e| e.label.key().to_string());

        state.clicks.push(RecordedClick {
            point,
            target: target.clone(),
        });

        if let Some(key) = target {
            Self::fire(&mut state, |r| r.on_click.as_deref() == Some(key.as_str()), now);
        }
        Ok(())
    }

    async fn press_and_release(&self, key: &str, hold: Duration) -> Result<(), PortError> {
        let background = self.lock().background;
        if background {
            return Err(PortError::NotForeground);
        }
        tokio::time::sleep(hold).await;

        let now = Instant::now();
        let mut state = self.lock();
        state.keys.push(RecordedKey {
            key: key.to_string(),
            hold,
        });
        Self::fire(&mut state, |r| r.on_key.as_deref() == Some(key), now);
        Ok(())
    }

    async fn hold_key(&self, key: &str) -> Result<(), PortError> {
        let mut state = self.lock();
        if state.background {
            return Err(PortError::NotForeground);
        }
        state.held.insert(key.to_string());
        Ok(())
    }

    async fn release_key(&self, key: &str) -> Result<(), PortError> {
        let mut state = self.lock();
        if !state.held.remove(key) {
            return Err(PortError::InputRejected(format!("'{}' was not held", key)));
        }
        state.keys.push(RecordedKey {
            key: key.to_string(),
            hold: Duration::ZERO,
        });
        Ok(())
    }

    async fn ensure_foreground(&self) -> bool {
        !self.lock().background
    }
}
