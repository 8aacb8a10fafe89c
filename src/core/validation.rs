use rust_decimal::Decimal;

use super::currencies::{Currency, is_known_currency_code};
use super::error::ValidationError;
use super::types::*;

/// Validate a tax configuration.
/// Returns all validation errors found (not just the first).
pub fn validate_tax(tax: &TaxDefinition) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    validate_tax_at(tax, "tax", &mut errors);
    errors
}

/// Validate a whole catalogue; field paths carry the index.
pub fn validate_taxes(taxes: &[TaxDefinition]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for (i, tax) in taxes.iter().enumerate() {
        validate_tax_at(tax, &format!("taxes[{i}]"), &mut errors);
    }
    errors
}

/// Validate a currency's code and rounding increment.
pub fn validate_currency(currency: &Currency) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if currency.code.len() != 3 {
        errors.push(ValidationError::with_rule(
            "currency.code",
            "currency code must be 3 characters (ISO 4217)",
            "CUR-01",
        ));
    } else if !is_known_currency_code(&currency.code) {
        errors.push(ValidationError::with_rule(
            "currency.code",
            format!("currency code '{}' is not a known ISO 4217 code", currency.code),
            "CUR-01",
        ));
    }

    if currency.rounding <= Decimal::ZERO {
        errors.push(ValidationError::with_rule(
            "currency.rounding",
            "rounding increment must be positive",
            "CUR-02",
        ));
    }

    errors
}

fn validate_tax_at(tax: &TaxDefinition, prefix: &str, errors: &mut Vec<ValidationError>) {
    if tax.name.trim().is_empty() {
        errors.push(ValidationError::with_rule(
            format!("{prefix}.name"),
            "tax name must not be empty",
            "TAX-01",
        ));
    }

    match tax.amount_type {
        AmountType::Group => {
            if tax.children.is_empty() {
                errors.push(ValidationError::with_rule(
                    format!("{prefix}.children"),
                    "a group of taxes must have at least one child",
                    "TAX-GRP-01",
                ));
            }
            for (i, child) in tax.children.iter().enumerate() {
                let child_prefix = format!("{prefix}.children[{i}]");
                if child.amount_type == AmountType::Group {
                    errors.push(ValidationError::with_rule(
                        &child_prefix,
                        "nested groups of taxes are not allowed",
                        "TAX-GRP-02",
                    ));
                }
                validate_tax_at(child, &child_prefix, errors);
            }
            // Groups carry no amount of their own
            return;
        }
        _ if !tax.children.is_empty() => {
            errors.push(ValidationError::with_rule(
                format!("{prefix}.children"),
                "only group taxes may have children",
                "TAX-GRP-03",
            ));
        }
        _ => {}
    }

    match tax.amount_type {
        AmountType::Percent if tax.amount <= -Decimal::ONE_HUNDRED => {
            errors.push(ValidationError::with_rule(
                format!("{prefix}.amount"),
                "percentage must be greater than -100",
                "TAX-AMT-01",
            ));
        }
        AmountType::Division
            if tax.amount.is_sign_negative() || tax.amount >= Decimal::ONE_HUNDRED =>
        {
            errors.push(ValidationError::with_rule(
                format!("{prefix}.amount"),
                "division percentage must be between 0 and 100 (exclusive)",
                "TAX-AMT-02",
            ));
        }
        AmountType::CodeComputed
            if tax.code_rule.as_deref().is_none_or(|k| k.trim().is_empty()) =>
        {
            errors.push(ValidationError::with_rule(
                format!("{prefix}.code_rule"),
                "code-computed tax must name a registered rule",
                "TAX-CODE-01",
            ));
        }
        _ => {}
    }

    validate_repartition(
        &tax.invoice_repartition,
        &format!("{prefix}.invoice_repartition"),
        errors,
    );
    validate_repartition(
        &tax.refund_repartition,
        &format!("{prefix}.refund_repartition"),
        errors,
    );

    let invoice_tax_lines = tax.tax_repartition(false).count();
    let refund_tax_lines = tax.tax_repartition(true).count();
    if invoice_tax_lines != refund_tax_lines {
        errors.push(ValidationError::with_rule(
            format!("{prefix}.refund_repartition"),
            format!(
                "invoice and refund distributions must have the same number of tax lines ({invoice_tax_lines} vs {refund_tax_lines})"
            ),
            "TAX-REP-02",
        ));
    }
}

fn validate_repartition(lines: &[RepartitionLine], prefix: &str, errors: &mut Vec<ValidationError>) {
    let base_lines = lines
        .iter()
        .filter(|l| l.kind == RepartitionKind::Base)
        .count();
    if base_lines != 1 {
        errors.push(ValidationError::with_rule(
            prefix,
            format!("distribution must contain exactly one base line, found {base_lines}"),
            "TAX-REP-01",
        ));
    }

    for (i, line) in lines.iter().enumerate() {
        if line.kind == RepartitionKind::Base && line.factor != Decimal::ONE {
            errors.push(ValidationError::with_rule(
                format!("{prefix}[{i}].factor"),
                "base lines must have a factor of 100%",
                "TAX-REP-03",
            ));
        }
    }
}
