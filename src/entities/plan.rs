// 💳 Plan Entity - packages and their usage quotas ("limitations")
//
// A member's remaining quota is copied from the plan when the plan is
// assigned and then counted down by usage.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

// ============================================================================
// PLAN TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    Free,
    Silver,
    Gold,
    Platinum,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Free => "free",
            PlanType::Silver => "silver",
            PlanType::Gold => "gold",
            PlanType::Platinum => "platinum",
        }
    }

    pub fn parse(s: &str) -> Option<PlanType> {
        match s.trim().to_lowercase().as_str() {
            "free" => Some(PlanType::Free),
            "silver" => Some(PlanType::Silver),
            "gold" => Some(PlanType::Gold),
            "platinum" => Some(PlanType::Platinum),
            _ => None,
        }
    }
}

// ============================================================================
// LIMITATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LimitKind {
    ContactViews,
    ExpressInterests,
    GalleryUploads,
}

impl LimitKind {
    pub fn label(&self) -> &'static str {
        match self {
            LimitKind::ContactViews => "contact view",
            LimitKind::ExpressInterests => "express interest",
            LimitKind::GalleryUploads => "gallery upload",
        }
    }
}

/// Remaining usage quota
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limitation {
    pub contact_views: i64,
    pub express_interests: i64,
    pub gallery_uploads: i64,
}

impl Limitation {
    pub fn remaining(&self, kind: LimitKind) -> i64 {
        match kind {
            LimitKind::ContactViews => self.contact_views,
            LimitKind::ExpressInterests => self.express_interests,
            LimitKind::GalleryUploads => self.gallery_uploads,
        }
    }

    /// Take one unit; false (and no change) when nothing is left
    pub fn consume(&mut self, kind: LimitKind) -> bool {
        let slot = match kind {
            LimitKind::ContactViews => &mut self.contact_views,
            LimitKind::ExpressInterests => &mut self.express_interests,
            LimitKind::GalleryUploads => &mut self.gallery_uploads,
        };
        if *slot <= 0 {
            return false;
        }
        *slot -= 1;
        true
    }
}

// ============================================================================
// PLAN
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub plan_type: PlanType,
    pub name: String,
    /// Price in minor units
    pub price: i64,
    pub validity_days: u32,
    pub limitation: Limitation,
}

/// Known plans, keyed by type
pub struct PlanRegistry {
    plans: Arc<RwLock<HashMap<PlanType, Plan>>>,
}

impl PlanRegistry {
    /// Registry with the four default packages
    pub fn new() -> Self {
        let mut registry = PlanRegistry {
            plans: Arc::new(RwLock::new(HashMap::new())),
        };
        registry.register_default_plans();
        registry
    }

    fn register_default_plans(&mut self) {
        self.register(Plan {
            plan_type: PlanType::Free,
            name: "Free".to_string(),
            price: 0,
            validity_days: 365,
            limitation: Limitation {
                contact_views: 0,
                express_interests: 5,
                gallery_uploads: 2,
            },
        });
        self.register(Plan {
            plan_type: PlanType::Silver,
            name: "Silver".to_string(),
            price: 99_900,
            validity_days: 90,
            limitation: Limitation {
                contact_views: 10,
                express_interests: 30,
                gallery_uploads: 5,
            },
        });
        self.register(Plan {
            plan_type: PlanType::Gold,
            name: "Gold".to_string(),
            price: 249_900,
            validity_days: 180,
            limitation: Limitation {
                contact_views: 30,
                express_interests: 100,
                gallery_uploads: 10,
            },
        });
        self.register(Plan {
            plan_type: PlanType::Platinum,
            name: "Platinum".to_string(),
            price: 499_900,
            validity_days: 365,
            limitation: Limitation {
                contact_views: 100,
                express_interests: 500,
                gallery_uploads: 20,
            },
        });
    }

    /// Add or replace a plan
    pub fn register(&mut self, plan: Plan) {
        if let Ok(mut plans) = self.plans.write() {
            plans.insert(plan.plan_type, plan);
        }
    }

    pub fn get(&self, plan_type: PlanType) -> Option<Plan> {
        self.plans.read().ok()?.get(&plan_type).cloned()
    }

    /// Starting quota for a plan (zero for an unknown plan)
    pub fn limitation_for(&self, plan_type: PlanType) -> Limitation {
        self.get(plan_type).map(|p| p.limitation).unwrap_or_default()
    }

    /// All plans, cheapest first
    pub fn all(&self) -> Vec<Plan> {
        let mut plans: Vec<Plan> = match self.plans.read() {
            Ok(plans) => plans.values().cloned().collect(),
            Err(_) => Vec::new(),
        };
        plans.sort_by_key(|p| p.price);
        plans
    }
}

impl Default for PlanRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_plans() {
        let registry = PlanRegistry::new();
        let all = registry.all();

        assert_eq!(all.len(), 4);
        assert_eq!(all[0].plan_type, PlanType::Free);
        assert_eq!(all[3].plan_type, PlanType::Platinum);
        assert_eq!(registry.limitation_for(PlanType::Free).contact_views, 0);
        assert_eq!(registry.limitation_for(PlanType::Gold).express_interests, 100);
    }

    #[test]
    fn test_consume_stops_at_zero() {
        let mut limit = Limitation {
            contact_views: 1,
            express_interests: 0,
            gallery_uploads: 3,
        };

        assert!(limit.consume(LimitKind::ContactViews));
        assert!(!limit.consume(LimitKind::ContactViews));
        assert_eq!(limit.contact_views, 0);
        assert!(!limit.consume(LimitKind::ExpressInterests));
        assert!(limit.consume(LimitKind::GalleryUploads));
        assert_eq!(limit.remaining(LimitKind::GalleryUploads), 2);
    }

    #[test]
    fn test_plan_type_parse() {
        assert_eq!(PlanType::parse("GOLD"), Some(PlanType::Gold));
        assert_eq!(PlanType::parse("diamond"), None);
    }
}
