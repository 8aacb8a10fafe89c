//! Group expansion.
//!
//! Taxes are applied in sequence order. A group tax takes the position of
//! its parent's sequence and is replaced by its own children, themselves
//! sorted by sequence. With letters as taxes and alphabetic order as
//! sequence, `[G, B(A, D, F), E, C]` is applied as `[A, D, F, C, E, G]`.

use super::types::{AmountType, TaxDefinition, TaxGroupRef};

/// A leaf tax together with the group it was expanded from.
#[derive(Debug, Clone, Copy)]
pub struct FlatTax<'a> {
    pub tax: &'a TaxDefinition,
    pub group: Option<&'a TaxDefinition>,
}

impl FlatTax<'_> {
    /// Output metadata for the originating group.
    pub fn group_ref(&self) -> Option<TaxGroupRef> {
        self.group.map(|g| TaxGroupRef {
            id: g.id,
            name: g.name.clone(),
        })
    }
}

/// Sort by sequence (stable) and replace groups by their flattened children.
///
/// Children of a nested group report the outermost group.
pub fn flatten_taxes(taxes: &[TaxDefinition]) -> Vec<FlatTax<'_>> {
    let mut sorted: Vec<&TaxDefinition> = taxes.iter().collect();
    sorted.sort_by_key(|t| t.sequence);

    let mut flat = Vec::with_capacity(sorted.len());
    for tax in sorted {
        if tax.amount_type == AmountType::Group {
            flat.extend(flatten_taxes(&tax.children).into_iter().map(|child| FlatTax {
                tax: child.tax,
                group: Some(tax),
            }));
        } else {
            flat.push(FlatTax { tax, group: None });
        }
    }
    flat
}

/// Owned leaf taxes in application order, without group metadata.
pub fn flattened(taxes: &[TaxDefinition]) -> Vec<TaxDefinition> {
    flatten_taxes(taxes)
        .into_iter()
        .map(|f| f.tax.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TaxDefinitionBuilder;
    use rust_decimal_macros::dec;

    fn tax(id: u32, name: &str, sequence: i32) -> TaxDefinition {
        TaxDefinitionBuilder::percent(id, name, dec!(1))
            .sequence(sequence)
            .build()
    }

    fn names(flat: &[FlatTax<'_>]) -> Vec<String> {
        flat.iter().map(|f| f.tax.name.clone()).collect()
    }

    #[test]
    fn group_takes_parent_sequence() {
        let b = TaxDefinitionBuilder::group(
            2,
            "B",
            vec![tax(3, "F", 6), tax(4, "A", 1), tax(5, "D", 4)],
        )
        .sequence(2)
        .build();
        let taxes = vec![tax(1, "G", 7), b, tax(6, "E", 5), tax(7, "C", 3)];

        let flat = flatten_taxes(&taxes);
        assert_eq!(names(&flat), ["A", "D", "F", "C", "E", "G"]);
        assert_eq!(flat[0].group.map(|g| g.id), Some(2));
        assert_eq!(flat[3].group_ref(), None);
    }

    #[test]
    fn equal_sequences_keep_input_order() {
        let taxes = vec![tax(1, "first", 10), tax(2, "second", 10), tax(3, "third", 1)];
        assert_eq!(
            names(&flatten_taxes(&taxes)),
            ["third", "first", "second"]
        );
    }

    #[test]
    fn nested_groups_report_outer_group() {
        let inner = TaxDefinitionBuilder::group(10, "inner", vec![tax(11, "leaf", 1)]).build();
        let outer = TaxDefinitionBuilder::group(20, "outer", vec![inner]).build();
        let taxes = [outer];
        let flat = flatten_taxes(&taxes);
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].tax.id, 11);
        assert_eq!(flat[0].group.map(|g| g.id), Some(20));
    }

    #[test]
    fn flattening_is_idempotent() {
        let group = TaxDefinitionBuilder::group(5, "G", vec![tax(6, "x", 2), tax(7, "y", 1)])
            .sequence(3)
            .build();
        let taxes = vec![tax(1, "a", 9), group];
        let once = flattened(&taxes);
        let twice = flattened(&once);
        assert_eq!(once, twice);
    }
}
