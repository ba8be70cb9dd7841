use crate::model::Theme;
use crate::storage::{self, Storage};
use tracing::info;

/// Two-state theme with persistence. A saved preference always wins; without
/// one the system preference applies, and Light is the final fallback.
/// System preference changes keep flowing through until the user picks a
/// theme explicitly.
pub struct ThemeController {
    storage: Storage,
    current: Theme,
    explicit_preference: bool,
}

impl ThemeController {
    pub fn new(storage: Storage, system_preference: Option<Theme>) -> Self {
        let saved: Option<Theme> = storage.load(storage::KEY_THEME, None);
        let current = saved.or(system_preference).unwrap_or_default();

        Self {
            storage,
            current,
            explicit_preference: saved.is_some(),
        }
    }

    pub fn current(&self) -> Theme {
        self.current
    }

    pub fn toggle(&mut self) -> (Theme, Theme) {
        let target = self.current.toggled();
        self.set(target).unwrap_or((self.current, self.current))
    }

    /// Returns the (old, new) pair for the change broadcast, or None when the
    /// theme is already set. Explicit choices are persisted.
    pub fn set(&mut self, theme: Theme) -> Option<(Theme, Theme)> {
        if theme == self.current {
            return None;
        }

        let old = self.current;
        self.current = theme;
        self.explicit_preference = true;
        self.storage.save(storage::KEY_THEME, &theme);
        info!(?old, new = ?theme, "theme changed");
        Some((old, theme))
    }

    /// Follows the system only while the user has never chosen a theme, and
    /// without recording the switch as an explicit preference.
    pub fn system_preference_changed(&mut self, theme: Theme) -> Option<(Theme, Theme)> {
        if self.explicit_preference || theme == self.current {
            return None;
        }

        let old = self.current;
        self.current = theme;
        info!(?old, new = ?theme, "theme follows system preference");
        Some((old, theme))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_storage() -> (tempfile::TempDir, Storage) {
        let dir = tempdir().expect("tempdir");
        let storage = Storage::open(dir.path().join("store")).expect("open");
        (dir, storage)
    }

    #[test]
    fn defaults_to_light_without_any_preference() {
        let (_dir, storage) = open_storage();
        let theme = ThemeController::new(storage, None);
        assert_eq!(theme.current(), Theme::Light);
    }

    #[test]
    fn system_preference_applies_when_nothing_saved() {
        let (_dir, storage) = open_storage();
        let theme = ThemeController::new(storage, Some(Theme::Dark));
        assert_eq!(theme.current(), Theme::Dark);
    }

    #[test]
    fn saved_preference_beats_system_preference() {
        let (_dir, storage) = open_storage();
        storage.save(storage::KEY_THEME, &Theme::Light);

        let theme = ThemeController::new(storage, Some(Theme::Dark));
        assert_eq!(theme.current(), Theme::Light);
    }

    #[test]
    fn toggle_persists_and_reports_the_change() {
        let (_dir, storage) = open_storage();
        let mut theme = ThemeController::new(storage.clone(), None);

        let (old, new) = theme.toggle();
        assert_eq!((old, new), (Theme::Light, Theme::Dark));

        let reloaded = ThemeController::new(storage, None);
        assert_eq!(reloaded.current(), Theme::Dark);
    }

    #[test]
    fn system_changes_stop_after_an_explicit_choice() {
        let (_dir, storage) = open_storage();
        let mut theme = ThemeController::new(storage, None);

        assert!(theme.system_preference_changed(Theme::Dark).is_some());
        assert_eq!(theme.current(), Theme::Dark);

        theme.set(Theme::Light);
        assert!(theme.system_preference_changed(Theme::Dark).is_none());
        assert_eq!(theme.current(), Theme::Light);
    }

    #[test]
    fn following_the_system_does_not_save_a_preference() {
        let (_dir, storage) = open_storage();
        let mut theme = ThemeController::new(storage.clone(), None);
        theme.system_preference_changed(Theme::Dark);

        // a fresh start without the system hint falls back to the default
        let reloaded = ThemeController::new(storage, None);
        assert_eq!(reloaded.current(), Theme::Light);
    }

    #[test]
    fn set_to_the_same_theme_reports_nothing() {
        let (_dir, storage) = open_storage();
        let mut theme = ThemeController::new(storage, None);
        assert!(theme.set(Theme::Light).is_none());
    }
}
