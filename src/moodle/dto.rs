use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CourseRaw {
    pub id: i64,
    #[serde(default)]
    pub fullname: Option<String>,
    #[serde(default)]
    pub shortname: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ItemTag {
    #[serde(default)]
    pub rawname: Option<String>,
    #[serde(default)]
    pub displayname: Option<String>,
}

impl ItemTag {
    pub fn name(&self) -> String {
        match self.displayname.as_deref() {
            Some(display) if !display.is_empty() => display.to_string(),
            _ => self.rawname.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub modules: Vec<Module>,
}

#[derive(Debug, Deserialize)]
pub struct Module {
    #[serde(default)]
    pub modname: String,
}

#[derive(Debug, Deserialize)]
pub struct UserRaw {
    pub id: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub fullname: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct UserGradeRaw {
    #[serde(default)]
    pub gradeitems: Vec<GradeItemRaw>,
}

#[derive(Debug, Deserialize)]
pub struct GradeItemRaw {
    #[serde(default)]
    pub itemname: Option<String>,
    #[serde(default)]
    pub itemtype: Option<String>,
    #[serde(default)]
    pub itemmodule: Option<String>,
    #[serde(default)]
    pub graderaw: Option<f64>,
    #[serde(default)]
    pub grademax: Option<f64>,
}
