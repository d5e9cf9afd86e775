use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::FeedConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Grid,
    List,
}

impl ViewMode {
    pub fn toggled(self) -> Self {
        match self {
            ViewMode::Grid => ViewMode::List,
            ViewMode::List => ViewMode::Grid,
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewMode::Grid => write!(f, "Grid"),
            ViewMode::List => write!(f, "List"),
        }
    }
}

/// Responsive width classes of the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Breakpoint {
    Small,
    Medium,
    Large,
}

impl Breakpoint {
    pub fn from_width(width: u16) -> Self {
        match width {
            0..=79 => Breakpoint::Small,
            80..=139 => Breakpoint::Medium,
            _ => Breakpoint::Large,
        }
    }
}

/// How feed cards are laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridLayout {
    /// One vertical list, optionally with a detail sidecard for the selection
    List { sidecards: bool },
    /// Fixed single column with a sidecard next to it
    SidecardColumn,
    Columns(usize),
}

impl GridLayout {
    pub fn columns(&self) -> usize {
        match self {
            GridLayout::Columns(n) => (*n).max(1),
            GridLayout::List { .. } | GridLayout::SidecardColumn => 1,
        }
    }

    pub fn has_sidecard(&self) -> bool {
        matches!(
            self,
            GridLayout::SidecardColumn | GridLayout::List { sidecards: true }
        )
    }
}

type ViewModeObserver = Box<dyn FnMut(ViewMode) + Send>;

/// View mode and layout parameters of one feed instance. Not persisted.
pub struct ViewState {
    view_mode: ViewMode,
    items_per_row: usize,
    configured_items_per_row: usize,
    show_sidecards: bool,
    sidecards_capable: bool,
    observers: Vec<ViewModeObserver>,
}

impl fmt::Debug for ViewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewState")
            .field("view_mode", &self.view_mode)
            .field("items_per_row", &self.items_per_row)
            .field("show_sidecards", &self.show_sidecards)
            .finish_non_exhaustive()
    }
}

impl ViewState {
    pub fn new(config: &FeedConfig) -> Self {
        let mut state = Self {
            view_mode: ViewMode::Grid,
            items_per_row: 4,
            configured_items_per_row: 4,
            show_sidecards: false,
            sidecards_capable: false,
            observers: Vec::new(),
        };
        state.reconfigure(config);
        state
    }

    /// Reinitialize from configuration. Registered observers are kept.
    pub fn reconfigure(&mut self, config: &FeedConfig) {
        self.configured_items_per_row = config.items_per_row.max(1);
        self.sidecards_capable = config.show_sidecards;
        self.show_sidecards = config.show_sidecards;
        self.view_mode = config.default_view_mode;
        self.items_per_row = if self.show_sidecards && self.view_mode == ViewMode::List {
            1
        } else {
            self.configured_items_per_row
        };
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn items_per_row(&self) -> usize {
        self.items_per_row
    }

    pub fn show_sidecards(&self) -> bool {
        self.show_sidecards
    }

    pub fn on_view_mode_change(&mut self, observer: impl FnMut(ViewMode) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn toggle_view_mode(&mut self) {
        self.set_view_mode(self.view_mode.toggled());
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        if mode == self.view_mode {
            return;
        }
        self.view_mode = mode;

        if self.sidecards_capable {
            match mode {
                ViewMode::List => {
                    self.show_sidecards = true;
                    self.items_per_row = 1;
                }
                ViewMode::Grid => {
                    self.show_sidecards = false;
                    self.items_per_row = self.configured_items_per_row;
                }
            }
        }

        for observer in &mut self.observers {
            observer(mode);
        }
    }

    pub fn layout(&self, breakpoint: Breakpoint) -> GridLayout {
        match self.view_mode {
            ViewMode::List => GridLayout::List {
                sidecards: self.show_sidecards,
            },
            ViewMode::Grid if self.show_sidecards => GridLayout::SidecardColumn,
            ViewMode::Grid => GridLayout::Columns(match breakpoint {
                Breakpoint::Small => 1,
                Breakpoint::Medium => self.items_per_row.min(3),
                Breakpoint::Large => self.items_per_row,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn config(show_sidecards: bool, items_per_row: usize) -> FeedConfig {
        FeedConfig {
            show_sidecards,
            items_per_row,
            ..FeedConfig::default()
        }
    }

    #[test]
    fn list_with_sidecards_forces_single_item_per_row() {
        let mut view = ViewState::new(&config(true, 5));
        view.set_view_mode(ViewMode::Grid);
        // grid with sidecards capability starts with sidecards shown
        assert_eq!(view.items_per_row(), 5);

        view.set_view_mode(ViewMode::List);
        assert_eq!(view.items_per_row(), 1);
        assert!(view.show_sidecards());

        view.set_view_mode(ViewMode::Grid);
        assert_eq!(view.items_per_row(), 5);
        assert!(!view.show_sidecards());
    }

    #[test]
    fn without_capability_only_mode_changes() {
        let mut view = ViewState::new(&config(false, 4));
        view.toggle_view_mode();
        assert_eq!(view.view_mode(), ViewMode::List);
        assert_eq!(view.items_per_row(), 4);
        assert!(!view.show_sidecards());
    }

    #[test]
    fn list_layout_ignores_items_per_row() {
        let mut view = ViewState::new(&config(false, 4));
        view.set_view_mode(ViewMode::List);
        assert_eq!(
            view.layout(Breakpoint::Large),
            GridLayout::List { sidecards: false }
        );
        assert_eq!(view.layout(Breakpoint::Large).columns(), 1);
    }

    #[test]
    fn grid_columns_degrade_by_breakpoint() {
        let view = ViewState::new(&config(false, 5));
        assert_eq!(view.layout(Breakpoint::Large), GridLayout::Columns(5));
        assert_eq!(view.layout(Breakpoint::Medium), GridLayout::Columns(3));
        assert_eq!(view.layout(Breakpoint::Small), GridLayout::Columns(1));

        let narrow = ViewState::new(&config(false, 2));
        assert_eq!(narrow.layout(Breakpoint::Medium), GridLayout::Columns(2));
    }

    #[test]
    fn grid_with_sidecards_uses_fixed_column() {
        let view = ViewState::new(&config(true, 4));
        assert_eq!(view.view_mode(), ViewMode::Grid);
        assert_eq!(view.layout(Breakpoint::Large), GridLayout::SidecardColumn);
        assert!(view.layout(Breakpoint::Large).has_sidecard());
    }

    #[test]
    fn observers_see_mode_changes() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut view = ViewState::new(&config(false, 4));
        let sink = Arc::clone(&seen);
        view.on_view_mode_change(move |mode| sink.lock().unwrap().push(mode));

        view.toggle_view_mode();
        view.set_view_mode(ViewMode::List);
        view.toggle_view_mode();
        assert_eq!(*seen.lock().unwrap(), vec![ViewMode::List, ViewMode::Grid]);
    }

    #[test]
    fn reconfigure_resets_from_config() {
        let mut view = ViewState::new(&config(false, 4));
        view.toggle_view_mode();
        view.reconfigure(&FeedConfig {
            default_view_mode: ViewMode::List,
            show_sidecards: true,
            ..FeedConfig::default()
        });
        assert_eq!(view.view_mode(), ViewMode::List);
        assert_eq!(view.items_per_row(), 1);
    }

    #[test]
    fn breakpoints_from_width() {
        assert_eq!(Breakpoint::from_width(60), Breakpoint::Small);
        assert_eq!(Breakpoint::from_width(100), Breakpoint::Medium);
        assert_eq!(Breakpoint::from_width(200), Breakpoint::Large);
    }
}
