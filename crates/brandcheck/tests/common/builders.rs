//! Builders for scripted capability replies and brand rules.

#![allow(dead_code)]

use std::fmt::Write;

use brandcheck::model::BrandConfig;

/// Builds a vision reply in the `Label: value` format the visual stage asks for.
pub struct VisionReply {
    description: String,
    logos: Vec<String>,
    colors: Vec<String>,
    people: u32,
    logo_visible: bool,
    handheld: bool,
    casual_setting: bool,
    authentic_feel: bool,
    professional_lighting: bool,
    studio_setup: bool,
}

impl VisionReply {
    /// A selfie-style frame with the Acme logo and brand colors.
    pub fn clean() -> Self {
        Self {
            description: "A person holding a can of Acme cola in a kitchen".to_string(),
            logos: vec!["Acme".to_string()],
            colors: vec!["red".to_string(), "white".to_string()],
            people: 1,
            logo_visible: true,
            handheld: true,
            casual_setting: true,
            authentic_feel: true,
            professional_lighting: false,
            studio_setup: false,
        }
    }

    /// A frame with nothing brand related in it.
    pub fn empty() -> Self {
        Self {
            description: "A plain grey wall".to_string(),
            logos: Vec::new(),
            colors: Vec::new(),
            people: 0,
            logo_visible: false,
            handheld: false,
            casual_setting: false,
            authentic_feel: false,
            professional_lighting: false,
            studio_setup: false,
        }
    }

    pub fn logos(mut self, logos: &[&str]) -> Self {
        self.logos = logos.iter().map(|l| l.to_string()).collect();
        self.logo_visible = !logos.is_empty();
        self
    }

    pub fn colors(mut self, colors: &[&str]) -> Self {
        self.colors = colors.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Studio look: professional lighting and setup, nothing handheld.
    pub fn produced(mut self) -> Self {
        self.handheld = false;
        self.casual_setting = false;
        self.authentic_feel = false;
        self.professional_lighting = true;
        self.studio_setup = true;
        self
    }

    pub fn build(&self) -> String {
        let list = |items: &[String]| {
            if items.is_empty() {
                "none".to_string()
            } else {
                items.join(", ")
            }
        };
        let yes_no = |value: bool| if value { "yes" } else { "no" };

        let mut out = String::new();
        let _ = writeln!(out, "Description: {}", self.description);
        let _ = writeln!(out, "Logos: {}", list(&self.logos));
        let _ = writeln!(out, "Text: none");
        let _ = writeln!(out, "Colors: {}", list(&self.colors));
        let _ = writeln!(out, "Objects: none");
        let _ = writeln!(out, "People: {}", self.people);
        let _ = writeln!(out, "Scene: indoor");
        let _ = writeln!(out, "Logo visible: {}", yes_no(self.logo_visible));
        let _ = writeln!(out, "Brand colors present: {}", yes_no(!self.colors.is_empty()));
        let _ = writeln!(out, "Product visible: {}", yes_no(self.logo_visible));
        let _ = writeln!(out, "Handheld: {}", yes_no(self.handheld));
        let _ = writeln!(out, "Casual setting: {}", yes_no(self.casual_setting));
        let _ = writeln!(out, "Authentic feel: {}", yes_no(self.authentic_feel));
        let _ = writeln!(
            out,
            "Professional lighting: {}",
            yes_no(self.professional_lighting)
        );
        let _ = write!(out, "Studio setup: {}", yes_no(self.studio_setup));
        out
    }
}

/// Builds the JSON reply of the language model for a compliance check.
pub struct ComplianceReply {
    status: String,
    notes: String,
    citations: Vec<serde_json::Value>,
}

impl ComplianceReply {
    pub fn new(status: &str, notes: &str) -> Self {
        Self {
            status: status.to_string(),
            notes: notes.to_string(),
            citations: Vec::new(),
        }
    }

    pub fn citation(mut self, kind: &str, spoken_text: &str, timestamp_ms: u64, confidence: f64) -> Self {
        self.citations.push(serde_json::json!({
            "type": kind,
            "spoken_text": spoken_text,
            "timestamp_ms": timestamp_ms,
            "confidence": confidence,
        }));
        self
    }

    pub fn build(&self) -> String {
        serde_json::json!({
            "status": self.status,
            "notes": self.notes,
            "citations": self.citations,
        })
        .to_string()
    }
}

/// Builder for brand vocabulary rules.
pub struct BrandBuilder {
    brand: BrandConfig,
}

impl BrandBuilder {
    pub fn new(brand_id: &str, brand_name: &str) -> Self {
        Self {
            brand: BrandConfig {
                brand_id: brand_id.to_string(),
                brand_name: brand_name.to_string(),
                phonetic_pronunciation: None,
                banned_terms: Vec::new(),
            },
        }
    }

    pub fn pronunciation(mut self, pronunciation: &str) -> Self {
        self.brand.phonetic_pronunciation = Some(pronunciation.to_string());
        self
    }

    pub fn banned(mut self, term: &str) -> Self {
        self.brand.banned_terms.push(term.to_string());
        self
    }

    pub fn build(self) -> BrandConfig {
        self.brand
    }
}
