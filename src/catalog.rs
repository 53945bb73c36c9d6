use rust_decimal::Decimal;

use crate::model::Slot;

/// A bookable service and its list price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub name: String,
    pub price: Decimal,
}

/// Read-only business configuration: the canonical day slots and the
/// services on offer. Shared by every component, never mutated.
#[derive(Debug, Clone)]
pub struct Catalog {
    slots: Vec<Slot>,
    services: Vec<Service>,
}

impl Catalog {
    /// Slots are sorted and de-duplicated; later services with an
    /// already-seen name are dropped.
    pub fn new(mut slots: Vec<Slot>, services: Vec<Service>) -> Self {
        slots.sort();
        slots.dedup();
        let mut unique: Vec<Service> = Vec::with_capacity(services.len());
        for service in services {
            if !unique.iter().any(|s| s.name == service.name) {
                unique.push(service);
            }
        }
        Self {
            slots,
            services: unique,
        }
    }

    /// Ordered canonical slots, identical on every call.
    pub fn all_slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn contains_slot(&self, slot: Slot) -> bool {
        self.slots.binary_search(&slot).is_ok()
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.name == name)
    }
}

impl Default for Catalog {
    /// Hourly slots 09:00–17:00 and a small barber menu.
    fn default() -> Self {
        let slots = (9..=17).filter_map(|h| Slot::from_hms(h, 0, 0)).collect();
        let services = vec![
            Service {
                name: "Corte".into(),
                price: Decimal::new(3500, 2),
            },
            Service {
                name: "Barba".into(),
                price: Decimal::new(2500, 2),
            },
            Service {
                name: "Corte e Barba".into(),
                price: Decimal::new(5500, 2),
            },
        ];
        Self::new(slots, services)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(s: &str) -> Slot {
        Slot::parse(s).unwrap()
    }

    #[test]
    fn slots_sorted_and_deduplicated() {
        let catalog = Catalog::new(
            vec![slot("10:00:00"), slot("09:00:00"), slot("10:00:00")],
            vec![],
        );
        assert_eq!(catalog.all_slots(), &[slot("09:00:00"), slot("10:00:00")]);
        assert!(catalog.contains_slot(slot("09:00:00")));
        assert!(!catalog.contains_slot(slot("09:30:00")));
    }

    #[test]
    fn all_slots_is_stable() {
        let catalog = Catalog::default();
        assert_eq!(catalog.all_slots(), catalog.all_slots());
        assert_eq!(catalog.all_slots().len(), 9);
        assert_eq!(catalog.all_slots()[0].to_string(), "09:00:00");
    }

    #[test]
    fn duplicate_service_names_keep_first() {
        let catalog = Catalog::new(
            vec![],
            vec![
                Service { name: "Corte".into(), price: Decimal::new(30, 0) },
                Service { name: "Corte".into(), price: Decimal::new(99, 0) },
            ],
        );
        assert_eq!(catalog.services().len(), 1);
        assert_eq!(catalog.service("Corte").unwrap().price, Decimal::new(30, 0));
        assert!(catalog.service("Manicure").is_none());
    }
}
