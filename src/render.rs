// rams-generation-client/src/render.rs

use chrono::{DateTime, Utc};
use handlebars::Handlebars;
use serde_json::json;
use tracing::info;

use crate::config::TemplateConfig;
use crate::document::{MethodStatement, StepBody};
use crate::error::Result;

const TEMPLATE_NAME: &str = "method_statement";

/// Renders a method statement to Markdown for export. Output is plain
/// Markdown, so template values are not HTML-escaped.
pub struct MethodStatementRenderer {
    handlebars: Handlebars<'static>,
}

impl MethodStatementRenderer {
    pub fn new(config: &TemplateConfig) -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        handlebars.register_escape_fn(handlebars::no_escape);

        let template_path = format!("{}/{}.md.hbs", config.path, TEMPLATE_NAME);
        handlebars.register_template_file(TEMPLATE_NAME, &template_path)?;

        Ok(Self { handlebars })
    }

    pub fn render(
        &self,
        document: &MethodStatement,
        generated_at: DateTime<Utc>,
    ) -> Result<String> {
        info!(title = %document.title, "Rendering method statement");

        let steps = document
            .steps
            .iter()
            .map(|step| {
                let (plain, intro, items) = match StepBody::parse(&step.description) {
                    StepBody::Plain(text) => (Some(text), None, Vec::new()),
                    StepBody::Enumerated { intro, items } => (None, intro, items),
                };
                json!({
                    "number": step.number,
                    "title": step.title,
                    "plain": plain,
                    "intro": intro,
                    "subSteps": items,
                    "hasSubSteps": !items.is_empty(),
                    "duration": step.duration,
                    "riskLevel": step.risk_level.as_str(),
                    "safetyRequirements": step.safety_requirements,
                    "hasSafetyRequirements": !step.safety_requirements.is_empty(),
                    "equipment": step.equipment,
                    "hasEquipment": !step.equipment.is_empty(),
                    "qualifications": step.qualifications,
                    "hasQualifications": !step.qualifications.is_empty(),
                    "notes": step.notes,
                })
            })
            .collect::<Vec<_>>();

        let hazards = document
            .risk_assessment
            .hazards
            .iter()
            .map(|hazard| {
                json!({
                    "description": hazard.description,
                    "likelihood": hazard.likelihood,
                    "severity": hazard.severity,
                    "score": hazard.score(),
                    "riskLevel": hazard.risk_level.as_str(),
                    "controlMeasure": hazard.control_measure,
                    "linkedStep": hazard
                        .linked_step()
                        .map(|step| step.to_string())
                        .unwrap_or_else(|| "General".to_string()),
                    "regulation": hazard.regulation,
                })
            })
            .collect::<Vec<_>>();

        let ppe = document
            .ppe
            .iter()
            .map(|item| {
                json!({
                    "type": item.ppe_type,
                    "standard": item.standard.clone().unwrap_or_default(),
                    "mandatory": item.mandatory,
                    "purpose": item.purpose.clone().unwrap_or_default(),
                })
            })
            .collect::<Vec<_>>();

        let context = json!({
            "title": document.title,
            "location": document.location,
            "contractor": document.contractor,
            "supervisor": document.supervisor,
            "generatedDate": generated_at.format("%Y-%m-%d").to_string(),
            "overallRiskLevel": document.overall_risk_level.as_str(),
            "totalEstimatedTime": document
                .total_estimated_time
                .clone()
                .unwrap_or_else(|| "N/A".to_string()),
            "steps": steps,
            "hazards": hazards,
            "hasHazards": !hazards.is_empty(),
            "ppe": ppe,
            "hasPpe": !ppe.is_empty(),
            "complianceRegulations": document.compliance_regulations,
            "hasRegulations": !document.compliance_regulations.is_empty(),
            "emergencyProcedures": document.emergency_procedures,
            "hasEmergencyProcedures": !document.emergency_procedures.is_empty(),
        });

        let rendered = self.handlebars.render(TEMPLATE_NAME, &context)?;

        info!(
            title = %document.title,
            size_bytes = rendered.len(),
            "Method statement rendered"
        );

        Ok(rendered)
    }
}
