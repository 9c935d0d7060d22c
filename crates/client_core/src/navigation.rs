use shared::domain::OperatorIdentity;

use crate::error::AccessError;

/// Top-level functional areas reachable from the header tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Area {
    Receipt,
    MenuA,
    MenuB,
    Settings,
}

impl Area {
    pub fn title(self) -> &'static str {
        match self {
            Area::Receipt => "Receipt",
            Area::MenuA => "Menu 1",
            Area::MenuB => "Menu 2",
            Area::Settings => "Settings",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SettingsView {
    #[default]
    Grid,
    UserManagement,
}

/// Entries of the settings grid, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsEntry {
    Home,
    Customers,
    Receipts,
    Messages,
    Payments,
    Users,
    Emitters,
    Articles,
    VatRates,
    Attachments,
    Departments,
}

impl SettingsEntry {
    pub const ALL: [SettingsEntry; 11] = [
        SettingsEntry::Home,
        SettingsEntry::Customers,
        SettingsEntry::Receipts,
        SettingsEntry::Messages,
        SettingsEntry::Payments,
        SettingsEntry::Users,
        SettingsEntry::Emitters,
        SettingsEntry::Articles,
        SettingsEntry::VatRates,
        SettingsEntry::Attachments,
        SettingsEntry::Departments,
    ];

    pub fn title(self) -> &'static str {
        match self {
            SettingsEntry::Home => "Home",
            SettingsEntry::Customers => "Customers",
            SettingsEntry::Receipts => "Receipts",
            SettingsEntry::Messages => "Messages",
            SettingsEntry::Payments => "Payments",
            SettingsEntry::Users => "Users",
            SettingsEntry::Emitters => "Emitters",
            SettingsEntry::Articles => "Articles",
            SettingsEntry::VatRates => "VAT rates",
            SettingsEntry::Attachments => "Attachments",
            SettingsEntry::Departments => "Departments",
        }
    }

    pub fn subtitle(self) -> &'static str {
        match self {
            SettingsEntry::Home => "Back to the main screen",
            SettingsEntry::Customers => "Customer records",
            SettingsEntry::Receipts => "History",
            SettingsEntry::Messages => "Headers and footers",
            SettingsEntry::Payments => "Methods",
            SettingsEntry::Users => "Access",
            SettingsEntry::Emitters => "Emitter records",
            SettingsEntry::Articles => "Catalogue",
            SettingsEntry::VatRates => "Rates",
            SettingsEntry::Attachments => "Files",
            SettingsEntry::Departments => "Categories",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NavigationState {
    pub area: Option<Area>,
    /// Only meaningful while `area` is `Settings`.
    pub settings_view: SettingsView,
}

#[derive(Debug, Default)]
pub struct NavigationController {
    state: NavigationState,
}

impl NavigationController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> NavigationState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = NavigationState::default();
    }

    /// Returns whether the state changed. Moving to a different area always
    /// lands on the settings grid the next time Settings is shown.
    pub fn select_area(&mut self, area: Area) -> bool {
        if self.state.area == Some(area) {
            return false;
        }
        self.state = NavigationState {
            area: Some(area),
            settings_view: SettingsView::Grid,
        };
        true
    }

    /// Returns whether the state changed. Non-admins are always refused;
    /// for admins this only acts from the settings grid.
    pub fn open_user_management(&mut self, operator: &OperatorIdentity) -> Result<bool, AccessError> {
        if !operator.is_admin() {
            return Err(AccessError::AuthorizationDenied);
        }
        if self.state.area != Some(Area::Settings) || self.state.settings_view != SettingsView::Grid {
            return Ok(false);
        }
        self.state.settings_view = SettingsView::UserManagement;
        Ok(true)
    }

    pub fn back(&mut self) -> bool {
        let changed = self.state.settings_view != SettingsView::Grid;
        self.state.settings_view = SettingsView::Grid;
        changed
    }

    /// Returns whether the state changed. Only `Users` does anything.
    pub fn activate_entry(
        &mut self,
        entry: SettingsEntry,
        operator: &OperatorIdentity,
    ) -> Result<bool, AccessError> {
        match entry {
            SettingsEntry::Users => self.open_user_management(operator),
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::domain::{EmitterId, OperatorId};

    fn operator(role: Option<&str>) -> OperatorIdentity {
        OperatorIdentity {
            id: OperatorId(5),
            username: "op".to_string(),
            given_name: None,
            family_name: None,
            role: role.map(str::to_string),
            emitter_id: Some(EmitterId(1)),
        }
    }

    fn in_settings() -> NavigationController {
        let mut nav = NavigationController::new();
        nav.select_area(Area::Settings);
        nav
    }

    #[test]
    fn starts_with_no_area_on_grid() {
        let nav = NavigationController::new();
        assert_eq!(nav.state().area, None);
        assert_eq!(nav.state().settings_view, SettingsView::Grid);
    }

    #[test]
    fn only_admin_opens_user_management() {
        for role in [None, Some("cashier"), Some("Admin"), Some(""), Some("admin ")] {
            let mut nav = in_settings();
            assert_eq!(
                nav.open_user_management(&operator(role)),
                Err(AccessError::AuthorizationDenied),
                "role {role:?} must be refused"
            );
            assert_eq!(nav.state().settings_view, SettingsView::Grid);
        }

        let mut nav = in_settings();
        assert_eq!(nav.open_user_management(&operator(Some("admin"))), Ok(true));
        assert_eq!(nav.state().settings_view, SettingsView::UserManagement);
        assert_eq!(nav.open_user_management(&operator(Some("admin"))), Ok(false));
    }

    #[test]
    fn user_management_only_opens_from_settings() {
        let admin = operator(Some("admin"));
        for area in [None, Some(Area::Receipt), Some(Area::MenuA), Some(Area::MenuB)] {
            let mut nav = NavigationController::new();
            if let Some(area) = area {
                nav.select_area(area);
            }
            let before = nav.state();
            assert_eq!(nav.open_user_management(&admin), Ok(false), "from {area:?}");
            assert_eq!(nav.activate_entry(SettingsEntry::Users, &admin), Ok(false), "from {area:?}");
            assert_eq!(nav.state(), before);
        }

        let mut nav = NavigationController::new();
        nav.select_area(Area::Receipt);
        assert_eq!(
            nav.open_user_management(&operator(Some("cashier"))),
            Err(AccessError::AuthorizationDenied)
        );
    }

    #[test]
    fn back_returns_to_grid_regardless_of_role() {
        let mut nav = in_settings();
        nav.open_user_management(&operator(Some("admin")))
            .expect("admin allowed");
        assert!(nav.back());
        assert_eq!(nav.state().settings_view, SettingsView::Grid);
        assert!(!nav.back());
    }

    #[test]
    fn changing_area_resets_sub_view() {
        let mut nav = in_settings();
        nav.open_user_management(&operator(Some("admin")))
            .expect("admin allowed");

        assert!(!nav.select_area(Area::Settings));
        assert_eq!(nav.state().settings_view, SettingsView::UserManagement);

        assert!(nav.select_area(Area::Receipt));
        assert!(nav.select_area(Area::Settings));
        assert_eq!(nav.state().settings_view, SettingsView::Grid);
    }

    #[test]
    fn non_user_entries_are_inert() {
        let admin = operator(Some("admin"));
        let mut nav = in_settings();
        for entry in SettingsEntry::ALL
            .into_iter()
            .filter(|entry| *entry != SettingsEntry::Users)
        {
            assert_eq!(nav.activate_entry(entry, &admin), Ok(false));
            assert_eq!(nav.state().settings_view, SettingsView::Grid);
        }
        assert_eq!(nav.activate_entry(SettingsEntry::Users, &admin), Ok(true));
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut nav = in_settings();
        nav.open_user_management(&operator(Some("admin")))
            .expect("admin allowed");
        nav.reset();
        assert_eq!(nav.state(), NavigationState::default());
    }
}
