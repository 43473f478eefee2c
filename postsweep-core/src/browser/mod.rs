mod automation;
mod driver;
mod error;
mod human;
mod page;
mod probe;
mod weighted;

pub use automation::{BrowserAutomation, BrowserLauncher, LaunchOverrides};
pub use driver::{Key, PageDriver, Scope};
pub use error::{BrowserError, BrowserResult};
pub use human::{
    DelayBand, HumanBehaviorSimulator, HumanState, Interjection, Mood, ScrollMethod,
    ScrollProfile, ScrollSize,
};
pub use page::ChromiumPage;
pub use probe::{bounded, bounded_ok};
pub use weighted::weighted_choice;
