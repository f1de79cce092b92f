use serde_json::json;

/// Functional tabs that carry an independent drill-down position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Students,
    Homework,
    Attendance,
    Finance,
}

pub const ALL_TABS: [Tab; 4] = [Tab::Students, Tab::Homework, Tab::Attendance, Tab::Finance];

impl Tab {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "STUDENTS" => Some(Self::Students),
            "HOMEWORK" => Some(Self::Homework),
            "ATTENDANCE" => Some(Self::Attendance),
            "FINANCE" => Some(Self::Finance),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Students => "STUDENTS",
            Self::Homework => "HOMEWORK",
            Self::Attendance => "ATTENDANCE",
            Self::Finance => "FINANCE",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Students => 0,
            Self::Homework => 1,
            Self::Attendance => 2,
            Self::Finance => 3,
        }
    }
}

/// One tab's remembered position. `generation` increases on every change so
/// that a roster response can be matched against the selection it was fetched
/// for; a client drops responses whose generation no longer matches.
#[derive(Debug, Clone, Default)]
pub struct TabSelection {
    pub class: Option<String>,
    pub section: Option<String>,
    pub generation: u64,
}

/// Per-tab drill-down state. Switching tabs never touches another tab's
/// position; back-navigation clears the deepest set field first.
#[derive(Debug, Clone, Default)]
pub struct NavState {
    tabs: [TabSelection; 4],
}

impl NavState {
    pub fn selection(&self, tab: Tab) -> &TabSelection {
        &self.tabs[tab.index()]
    }

    pub fn select_class(&mut self, tab: Tab, class: String) -> u64 {
        let sel = &mut self.tabs[tab.index()];
        sel.class = Some(class);
        sel.section = None;
        sel.generation += 1;
        sel.generation
    }

    /// A section only makes sense under a selected class.
    pub fn select_section(&mut self, tab: Tab, section: String) -> Result<u64, &'static str> {
        let sel = &mut self.tabs[tab.index()];
        if sel.class.is_none() {
            return Err("select a class before a section");
        }
        sel.section = Some(section);
        sel.generation += 1;
        Ok(sel.generation)
    }

    pub fn back(&mut self, tab: Tab) -> u64 {
        let sel = &mut self.tabs[tab.index()];
        if sel.section.is_some() {
            sel.section = None;
        } else {
            sel.class = None;
        }
        sel.generation += 1;
        sel.generation
    }

    pub fn snapshot(&self) -> serde_json::Value {
        let mut out = serde_json::Map::new();
        for tab in ALL_TABS {
            let sel = self.selection(tab);
            out.insert(
                tab.as_str().to_string(),
                json!({
                    "selectedClass": sel.class,
                    "selectedSection": sel.section,
                    "generation": sel.generation
                }),
            );
        }
        serde_json::Value::Object(out)
    }
}
