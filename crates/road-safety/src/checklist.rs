/// Compliance checklist builder.
///
/// Priority, cost band and timeline are coarse category-driven estimates
/// used for triage, not engineering costings.
use safety_common::api::{ChecklistItem, ComplianceChecklistResponse};

use crate::model::InterventionRecord;

const CHECKLIST_TITLE: &str = "Road Safety Compliance Checklist";
const STATUS_PENDING: &str = "Pending Review";

pub fn build_checklist(records: &[&InterventionRecord]) -> ComplianceChecklistResponse {
    let items = records
        .iter()
        .map(|record| {
            let priority = priority_for(&record.category);
            ChecklistItem {
                intervention: record.title.clone(),
                standard: record.standard_reference(),
                category: record.category.clone(),
                compliance_status: STATUS_PENDING.to_string(),
                priority: priority.to_string(),
                estimated_cost: cost_band(priority).to_string(),
                estimated_timeline: timeline(priority).to_string(),
            }
        })
        .collect();

    ComplianceChecklistResponse {
        title: CHECKLIST_TITLE.to_string(),
        items,
    }
}

fn priority_for(category: &str) -> &'static str {
    match category {
        "Traffic Signs" | "Pedestrian Facilities" | "Speed Management" => "High",
        "Road Markings" | "Lighting" => "Medium",
        "Drainage" => "Low",
        _ => "Medium",
    }
}

fn cost_band(priority: &str) -> &'static str {
    match priority {
        "High" => "₹2,00,000 - ₹10,00,000",
        "Low" => "₹5,000 - ₹50,000",
        _ => "₹50,000 - ₹2,00,000",
    }
}

fn timeline(priority: &str) -> &'static str {
    match priority {
        "High" => "1-2 weeks",
        "Low" => "4-8 weeks",
        _ => "2-4 weeks",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(category: &str) -> InterventionRecord {
        InterventionRecord {
            id: "I1".to_string(),
            title: "Replace STOP signage".to_string(),
            problem_type: "Damaged signage".to_string(),
            category: category.to_string(),
            keywords: vec!["stop sign".to_string()],
            road_types: vec![],
            environments: vec![],
            standard_code: "IRC:67-2012".to_string(),
            clause: "14.4".to_string(),
            description: "desc".to_string(),
            implementation_guidance: "guidance".to_string(),
        }
    }

    #[test]
    fn category_drives_priority_cost_and_timeline() {
        let signs = record("Traffic Signs");
        let lighting = record("Lighting");
        let drainage = record("Drainage");
        let checklist = build_checklist(&[&signs, &lighting, &drainage]);

        assert_eq!(checklist.title, "Road Safety Compliance Checklist");
        assert_eq!(checklist.items.len(), 3);

        assert_eq!(checklist.items[0].priority, "High");
        assert_eq!(checklist.items[0].estimated_timeline, "1-2 weeks");
        assert_eq!(checklist.items[1].priority, "Medium");
        assert_eq!(checklist.items[2].priority, "Low");
        assert_eq!(checklist.items[2].estimated_cost, "₹5,000 - ₹50,000");
        assert_eq!(checklist.items[0].standard, "IRC:67-2012 Clause 14.4");
        assert_eq!(checklist.items[0].compliance_status, "Pending Review");
    }

    #[test]
    fn unknown_category_defaults_to_medium() {
        let other = record("Junction Improvement");
        let checklist = build_checklist(&[&other]);
        assert_eq!(checklist.items[0].priority, "Medium");
        assert_eq!(checklist.items[0].estimated_timeline, "2-4 weeks");
    }

    #[test]
    fn empty_input_yields_empty_checklist() {
        let checklist = build_checklist(&[]);
        assert!(checklist.items.is_empty());
    }
}
