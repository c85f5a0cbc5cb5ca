//! Instruction templates for invoice/certificate verification.
//!
//! Every prompt lives here so the wording can be reviewed and tested without
//! a model. The four checks are always stated in the same order and with the
//! same headings; that is what makes reports from different runs comparable.
//!
//! Callers can replace the template via
//! [`crate::config::VerificationConfig::instruction_override`]; the image
//! layout preamble from [`layout_preamble`] is kept in either case.

use crate::config::PromptVersion;

/// Opening line shared by every template.
const ROLE_LINE: &str =
    "You are an auditor verifying a supplier invoice against the supplier's certificate.";

/// Check 1: issuer identity.
pub const CHECK_ISSUER: &str = r#"1. ISSUER IDENTITY
   Compare the issuer of the invoice (company name, address, registration or operator identifiers) with the certificate holder named on the certificate.
   Quote both values and state MATCH or MISMATCH."#;

/// Check 2: validity period.
pub const CHECK_VALIDITY: &str = r#"2. VALIDITY PERIOD
   Quote the certificate's validity start and end dates, and the invoice's collection date and due date.
   State COVERED only if the certificate is valid for the whole range from the collection date through the due date; otherwise state NOT COVERED."#;

/// Check 3: product registry matching.
pub const CHECK_PRODUCTS: &str = r#"3. PRODUCT REGISTRY
   For every product line item on the invoice, look for the corresponding entry in the certificate's product registry section.
   Treat near-miss textual matches as NON-matches: a product whose category or preparation type differs (for example fresh vs. frozen, whole vs. sliced, raw vs. cooked) is NOT a match, even if the names partially overlap."#;

/// Check 4: unmatched EANs, exhaustive table.
pub const CHECK_UNMATCHED: &str = r#"4. UNMATCHED PRODUCTS
   List EVERY invoice line item that has no match in the certificate, without omission, as a Markdown table with the columns:
   | EAN | Product description | Reason |
   If every line item is matched, write exactly: No unmatched products."#;

/// Final verdict requested by [`PromptVersion::StrictAcceptance`].
pub const STRICT_VERDICT: &str = r#"After the four checks, end your report with a single line:
   VERDICT: ACCEPTED   if all four checks pass and no product is unmatched
   VERDICT: REJECTED   otherwise"#;

/// Build the instruction text for a request.
///
/// # Arguments
/// * `version`          — template to use
/// * `invoice_pages`    — number of leading images that belong to the invoice
/// * `certificate_pages` — number of following images that belong to the certificate
/// * `language`         — optional report language
/// * `override_text`    — replaces the template body when set
pub fn build_instruction(
    version: PromptVersion,
    invoice_pages: usize,
    certificate_pages: usize,
    language: Option<&str>,
    override_text: Option<&str>,
) -> String {
    let mut parts = vec![
        ROLE_LINE.to_string(),
        layout_preamble(invoice_pages, certificate_pages),
    ];

    match override_text {
        Some(text) => parts.push(text.trim().to_string()),
        None => parts.push(template_body(version)),
    }

    if let Some(lang) = language.map(str::trim).filter(|l| !l.is_empty()) {
        parts.push(format!("Write the entire report in {lang}."));
    }

    parts.join("\n\n")
}

/// Tell the model which images belong to which document.
pub fn layout_preamble(invoice_pages: usize, certificate_pages: usize) -> String {
    format!(
        "The first {} image{} {} the page{} of the INVOICE, in page order. \
The remaining {} image{} {} the page{} of the CERTIFICATE, in page order.",
        invoice_pages,
        plural(invoice_pages),
        verb(invoice_pages),
        plural(invoice_pages),
        certificate_pages,
        plural(certificate_pages),
        verb(certificate_pages),
        plural(certificate_pages),
    )
}

fn template_body(version: PromptVersion) -> String {
    match version {
        PromptVersion::IssuerValidity => format!(
            "Perform exactly the following two checks, in this order, and report each under its own numbered heading:\n\n{}\n\n{}",
            CHECK_ISSUER, CHECK_VALIDITY
        ),
        PromptVersion::ProductRegistry => format!(
            "Perform exactly the following four checks, in this order, and report each under its own numbered heading:\n\n{}\n\n{}\n\n{}\n\n{}",
            CHECK_ISSUER, CHECK_VALIDITY, CHECK_PRODUCTS, CHECK_UNMATCHED
        ),
        PromptVersion::StrictAcceptance => format!(
            "Perform exactly the following four checks, in this order, and report each under its own numbered heading:\n\n{}\n\n{}\n\n{}\n\n{}\n\n{}",
            CHECK_ISSUER, CHECK_VALIDITY, CHECK_PRODUCTS, CHECK_UNMATCHED, STRICT_VERDICT
        ),
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

fn verb(n: usize) -> &'static str {
    if n == 1 {
        "is"
    } else {
        "are"
    }
}
