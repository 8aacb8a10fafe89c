//! Withholding certificate data ("certificat de retenue à la source").
//!
//! Assembles what the printed certificate shows; the layout itself is left
//! to the host's report engine.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::document::WithholdingDocument;
use super::types::{Partner, WithholdingKind, WithholdingTax};
use crate::core::FiscalError;

/// The four parts of a Tunisian tax identifier, `1234567A/B/M/000`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatriculeFiscal {
    /// Identifier with its control letter (8 characters).
    pub tax_id: String,
    /// VAT code.
    pub tva_code: String,
    /// Category code.
    pub category_code: String,
    /// Secondary establishment number.
    pub establishment: String,
}

impl MatriculeFiscal {
    /// Split a matricule as typed by users, with or without separators.
    ///
    /// Parts missing from a short value are a single space, so the
    /// certificate boxes stay aligned. An empty value gives empty parts.
    ///
    /// ```
    /// use fiscal_tn::withholding::MatriculeFiscal;
    ///
    /// let mf = MatriculeFiscal::parse("1234567a/b/m/000");
    /// assert_eq!(mf.tax_id, "1234567A");
    /// assert_eq!(mf.tva_code, "B");
    /// assert_eq!(mf.category_code, "M");
    /// assert_eq!(mf.establishment, "000");
    /// ```
    pub fn parse(vat: &str) -> Self {
        if vat.is_empty() {
            return Self::default();
        }
        let chars: Vec<char> = vat
            .chars()
            .filter(|c| *c != '/' && *c != ' ')
            .flat_map(char::to_uppercase)
            .collect();
        let part = |from: usize, to: usize| -> String {
            if chars.len() > from {
                chars[from..to.min(chars.len())].iter().collect()
            } else {
                " ".to_string()
            }
        };

        Self {
            tax_id: chars.iter().take(8).collect(),
            tva_code: part(8, 9),
            category_code: part(9, 10),
            establishment: part(10, chars.len().max(10)),
        }
    }
}

impl fmt::Display for MatriculeFiscal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.tax_id, self.tva_code, self.category_code, self.establishment
        )
    }
}

/// Payer or beneficiary block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateParty {
    pub name: String,
    pub vat: Option<String>,
    pub matricule: MatriculeFiscal,
}

impl CertificateParty {
    fn from_partner(partner: &Partner) -> Self {
        Self {
            name: partner.name.clone(),
            vat: partner.vat.clone(),
            matricule: MatriculeFiscal::parse(partner.vat.as_deref().unwrap_or_default()),
        }
    }
}

/// One withholding rate on the certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRow {
    pub tax_name: String,
    /// Invoice totals the rate was withheld on.
    pub gross: Decimal,
    pub withheld: Decimal,
    pub net: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithholdingCertificate {
    pub reference: String,
    pub date: NaiveDate,
    /// The party that withheld and remits to the tax authority.
    pub payer: CertificateParty,
    pub beneficiary: CertificateParty,
    /// One row per distinct rate name.
    pub rows: Vec<CertificateRow>,
    /// Catalogue rates not used by the document, printed as empty boxes.
    pub unused_taxes: Vec<String>,
    pub gross_total: Decimal,
    pub withheld_total: Decimal,
    pub net_total: Decimal,
    /// Invoice names, comma separated.
    pub invoices: String,
}

impl WithholdingCertificate {
    /// Certificate data of `doc`; `company` is the ledger's own partner and
    /// `catalog` every withholding rate the company knows.
    ///
    /// Fails if the payer has no VAT number.
    pub fn from_document(
        doc: &WithholdingDocument,
        company: &Partner,
        catalog: &[WithholdingTax],
    ) -> Result<Self, FiscalError> {
        let (payer, beneficiary) = match doc.kind() {
            WithholdingKind::Supplier => (company, doc.partner()),
            WithholdingKind::Customer => (doc.partner(), company),
        };
        if payer.vat.as_deref().is_none_or(|v| v.trim().is_empty()) {
            return Err(FiscalError::Validation(format!(
                "the VAT number of {} is required on withholding certificates",
                payer.name
            )));
        }

        let gross = doc.gross_total();
        let mut rows: Vec<CertificateRow> = Vec::new();
        let mut withheld_total = Decimal::ZERO;
        for t in doc.tax_amounts()? {
            withheld_total += t.amount;
            match rows.iter_mut().find(|r| r.tax_name == t.tax.name) {
                Some(row) => {
                    row.withheld += t.amount;
                    row.net -= t.amount;
                }
                None => rows.push(CertificateRow {
                    tax_name: t.tax.name.clone(),
                    gross,
                    withheld: t.amount,
                    net: gross - t.amount,
                }),
            }
        }

        let unused_taxes = catalog
            .iter()
            .filter(|t| !doc.taxes().iter().any(|used| used.id == t.id))
            .map(|t| t.name.clone())
            .collect();

        let invoices = doc
            .invoices()
            .iter()
            .map(|i| i.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        Ok(Self {
            reference: doc.name().to_string(),
            date: doc.date(),
            payer: CertificateParty::from_partner(payer),
            beneficiary: CertificateParty::from_partner(beneficiary),
            rows,
            unused_taxes,
            gross_total: gross,
            withheld_total,
            net_total: gross - withheld_total,
            invoices,
        })
    }
}
