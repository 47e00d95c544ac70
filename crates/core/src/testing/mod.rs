//! Testing utilities for driving sessions without a game.
//!
//! The [`crate::simulation::SimulatedScreen`] stands in for both host ports;
//! this module adds canned configurations and a scene that plays the full
//! round loop.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use walnut_core::testing::fixtures;
//! use walnut_core::SessionOrchestrator;
//!
//! let screen = Arc::new(fixtures::walnut_screen());
//! let mut config = fixtures::config();
//! config.session.round_limit = 2;
//!
//! let report = SessionOrchestrator::new(&config, screen.clone(), screen.clone())
//!     .run()
//!     .await;
//! assert_eq!(report.rounds_completed, 2);
//! ```

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::collections::BTreeMap;

    use crate::config::{
        BranchPolicy, Config, DispelConfig, EscapeConfig, SessionConfig, SessionTask,
        SignatureTable, TimingConfig,
    };
    use crate::signature::{Location, Signature};
    use crate::simulation::{Reaction, Scene, SceneElement, ScreenSize, SimulatedScreen};

    pub const REWARD_HEADING: Location = Location::new(860, 80, 200, 40);
    pub const CONFIRM_BUTTON: Location = Location::new(1600, 980, 200, 50);
    pub const WITHDRAW_BUTTON: Location = Location::new(1300, 900, 160, 50);
    pub const CONTINUE_BUTTON: Location = Location::new(1550, 900, 200, 50);
    pub const SELECTION_HEADING: Location = Location::new(880, 60, 160, 40);
    pub const LETTER: Location = Location::new(400, 400, 120, 120);
    pub const ABANDON_BUTTON: Location = Location::new(880, 600, 160, 40);
    pub const DISMISS_BUTTON: Location = Location::new(1000, 700, 100, 40);
    pub const START_BUTTON: Location = Location::new(860, 900, 200, 50);
    pub const DISPEL_MARKER: Location = Location::new(1700, 120, 120, 40);
    pub const REPLAY_BUTTON: Location = Location::new(1500, 950, 200, 50);

    /// The signature table of the walnut-opening session.
    pub fn signatures() -> SignatureTable {
        SignatureTable {
            round_start: Signature::text("reward_selection", ["密函报酬选择"]),
            confirm: Signature::text("confirm_selection", ["确认选择"]),
            withdraw: Signature::text("withdraw", ["撤离"]),
            proceed: Signature::text("continue", ["继续挑战", "○继续挑战"]),
            selection_screen: Some(Signature::text("letter_selection", ["选择密函"])),
            abandon: Some(Signature::text("abandon", ["放弃挑战"])),
            dismiss: Some(Signature::text("dismiss", ["确定"])),
        }
    }

    /// A valid configuration with default timing, an unbounded round limit and
    /// the `lizbeth` alternative selected.
    pub fn config() -> Config {
        Config {
            session: SessionConfig {
                round_limit: 0,
                max_attempts: 3,
                alternative: "lizbeth".to_string(),
                branch_policy: BranchPolicy::Continue,
                task: SessionTask::Walnut,
            },
            timing: TimingConfig::default(),
            escape: EscapeConfig::default(),
            dispel: DispelConfig::default(),
            signatures: signatures(),
            alternatives: BTreeMap::from([(
                "lizbeth".to_string(),
                Signature::feature("lizbeth_letter", "lizibeier"),
            )]),
        }
    }

    /// [`config`] switched to the dispel task.
    pub fn dispel_config() -> Config {
        let mut config = config();
        config.session.task = SessionTask::Dispel;
        config
    }

    /// Reactions of the pause menu and its abandon dialog.
    pub fn escape_dialog() -> Vec<Reaction> {
        vec![
            Reaction::on_key("esc")
                .showing(SceneElement::text("放弃挑战", ABANDON_BUTTON).appearing_after(500)),
            Reaction::on_click("放弃挑战")
                .hiding(["放弃挑战"])
                .showing(SceneElement::text("确定", DISMISS_BUTTON).appearing_after(300)),
            Reaction::on_click("确定").hiding(["确定"]),
        ]
    }

    /// A scene that plays any number of rounds.
    ///
    /// The reward screen shows up 2s in. Confirming it offers both branches;
    /// continuing leads to the letter selection, and confirming that brings
    /// the next reward screen 3s later.
    pub fn walnut_scene() -> Scene {
        let mut reactions = vec![
            Reaction::on_click("确认选择")
                .when_visible("密函报酬选择")
                .hiding(["密函报酬选择", "确认选择"])
                .showing(SceneElement::text("撤离", WITHDRAW_BUTTON).appearing_after(800))
                .showing(SceneElement::text("继续挑战", CONTINUE_BUTTON).appearing_after(800)),
            Reaction::on_click("继续挑战")
                .hiding(["撤离", "继续挑战"])
                .showing(
                    SceneElement::text("选择密函", SELECTION_HEADING).appearing_after(1000),
                )
                .showing(SceneElement::feature("lizibeier", LETTER).appearing_after(1000))
                .showing(SceneElement::text("确认选择", CONFIRM_BUTTON).appearing_after(1000)),
            Reaction::on_click("确认选择")
                .when_visible("选择密函")
                .hiding(["选择密函", "lizibeier", "确认选择"])
                .showing(
                    SceneElement::text("密函报酬选择", REWARD_HEADING).appearing_after(3000),
                )
                .showing(SceneElement::text("确认选择", CONFIRM_BUTTON).appearing_after(3000)),
            Reaction::on_click("撤离").hiding(["撤离", "继续挑战"]),
        ];
        reactions.extend(escape_dialog());

        Scene {
            screen: ScreenSize::default(),
            elements: vec![
                SceneElement::text("密函报酬选择", REWARD_HEADING).appearing_after(2000),
                SceneElement::text("确认选择", CONFIRM_BUTTON).appearing_after(2000),
            ],
            reactions,
        }
    }

    pub fn walnut_screen() -> SimulatedScreen {
        SimulatedScreen::from_scene(walnut_scene())
    }

    /// A dispel scene that plays any number of rounds.
    ///
    /// A leftover confirmation and the start button show up 1s in. Starting
    /// loads the map 2s later and the run ends 6s after the start, offering a
    /// replay. Replaying brings the start button back 2s later. Abandoning a
    /// run through the pause menu also ends on the replay screen.
    pub fn dispel_scene() -> Scene {
        let mut reactions = vec![
            Reaction::on_click("确认选择").hiding(["确认选择"]),
            Reaction::on_click("开始挑战")
                .hiding(["开始挑战"])
                .showing(SceneElement::text("驱离", DISPEL_MARKER).appearing_after(2000))
                .showing(SceneElement::text("再次进行", REPLAY_BUTTON).appearing_after(6000)),
            Reaction::on_click("再次进行")
                .hiding(["再次进行", "驱离"])
                .showing(SceneElement::text("开始挑战", START_BUTTON).appearing_after(2000)),
        ];
        reactions.extend(escape_dialog());
        reactions.push(
            Reaction::on_click("确定")
                .hiding(["驱离"])
                .showing(SceneElement::text("再次进行", REPLAY_BUTTON).appearing_after(1000)),
        );

        Scene {
            screen: ScreenSize::default(),
            elements: vec![
                SceneElement::text("确认选择", CONFIRM_BUTTON).appearing_after(1000),
                SceneElement::text("开始挑战", START_BUTTON).appearing_after(1000),
            ],
            reactions,
        }
    }

    pub fn dispel_screen() -> SimulatedScreen {
        SimulatedScreen::from_scene(dispel_scene())
    }
}
