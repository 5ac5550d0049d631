//! Reference yields and prices for the common Hungarian field crops.
//!
//! Used to fill in financials for extracted cultures and to build placeholder
//! cultures when nothing usable was extracted. Figures are national averages
//! in tonnes per hectare and HUF per tonne.

use crate::record::{Culture, Slot};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropReference {
    pub name: &'static str,
    aliases: &'static [&'static str],
    pub yield_per_hectare: f64,
    pub price_per_tonne: f64,
}

pub const CROPS: &[CropReference] = &[
    CropReference {
        name: "Búza",
        aliases: &["buza", "őszi búza", "oszi buza", "wheat", "durum búza"],
        yield_per_hectare: 5.5,
        price_per_tonne: 75_000.0,
    },
    CropReference {
        name: "Kukorica",
        aliases: &["kukorica", "silókukorica", "csemegekukorica", "maize", "corn"],
        yield_per_hectare: 7.5,
        price_per_tonne: 70_000.0,
    },
    CropReference {
        name: "Napraforgó",
        aliases: &["napraforgo", "sunflower"],
        yield_per_hectare: 2.8,
        price_per_tonne: 160_000.0,
    },
    CropReference {
        name: "Őszi árpa",
        aliases: &["árpa", "arpa", "oszi arpa", "tavaszi árpa", "barley"],
        yield_per_hectare: 5.0,
        price_per_tonne: 65_000.0,
    },
    CropReference {
        name: "Repce",
        aliases: &["őszi káposztarepce", "káposztarepce", "rapeseed"],
        yield_per_hectare: 3.2,
        price_per_tonne: 180_000.0,
    },
];

/// Applied to cultures not in [`CROPS`].
pub const GENERIC: CropReference = CropReference {
    name: "Egyéb kultúra",
    aliases: &[],
    yield_per_hectare: 4.0,
    price_per_tonne: 80_000.0,
};

/// Reference figures for a culture name, falling back to [`GENERIC`].
pub fn lookup(name: &str) -> CropReference {
    let wanted = name.trim().to_lowercase();
    CROPS
        .iter()
        .find(|c| c.name.to_lowercase() == wanted || c.aliases.contains(&wanted.as_str()))
        .copied()
        .unwrap_or(GENERIC)
}

/// Fill unknown yield, price and revenue from the reference table.
///
/// Values the model reported are kept. Revenue is recomputed whenever
/// hectares, yield and price are all known.
pub fn fill_financials(culture: &mut Culture) {
    let reference = lookup(&culture.name);
    if !culture.yield_per_hectare.is_populated() {
        culture.yield_per_hectare = Slot::Known(reference.yield_per_hectare);
    }
    if !culture.price_per_tonne.is_populated() {
        culture.price_per_tonne = Slot::Known(reference.price_per_tonne);
    }
    culture.revenue = match (
        culture.hectares.known(),
        culture.yield_per_hectare.known(),
        culture.price_per_tonne.known(),
    ) {
        (Some(ha), Some(y), Some(p)) => Slot::Known(round_huf(ha * y * p)),
        _ => Slot::NotAvailable,
    };
}

/// Round to whole forints.
pub fn round_huf(value: f64) -> f64 {
    value.round()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name_and_alias() {
        assert_eq!(lookup("Búza").yield_per_hectare, 5.5);
        assert_eq!(lookup("  őszi búza ").name, "Búza");
        assert_eq!(lookup("KUKORICA").price_per_tonne, 70_000.0);
        assert_eq!(lookup("Lucerna"), GENERIC);
    }

    #[test]
    fn fills_missing_financials_and_revenue() {
        let mut c = Culture::new("Napraforgó", 10.0);
        fill_financials(&mut c);
        assert_eq!(c.yield_per_hectare, Slot::Known(2.8));
        assert_eq!(c.price_per_tonne, Slot::Known(160_000.0));
        assert_eq!(c.revenue, Slot::Known(4_480_000.0));
    }

    #[test]
    fn reported_yield_is_kept() {
        let mut c = Culture::new("Búza", 10.0);
        c.yield_per_hectare = Slot::Known(6.0);
        fill_financials(&mut c);
        assert_eq!(c.yield_per_hectare, Slot::Known(6.0));
        assert_eq!(c.revenue, Slot::Known(4_500_000.0));
    }

    #[test]
    fn unknown_hectares_leaves_revenue_unknown() {
        let mut c = Culture {
            name: "Repce".into(),
            ..Default::default()
        };
        fill_financials(&mut c);
        assert_eq!(c.revenue, Slot::NotAvailable);
    }
}
