use std::collections::{BTreeMap, BTreeSet};

use super::domain::{ApplicationType, DocumentAttachment, DocumentType};

/// Minimum document set per application type, checked on SUBMIT only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRequirements {
    required: BTreeMap<ApplicationType, BTreeSet<DocumentType>>,
}

impl DocumentRequirements {
    pub fn new(required: BTreeMap<ApplicationType, BTreeSet<DocumentType>>) -> Self {
        Self { required }
    }

    /// Replace the requirement for one application type.
    pub fn with(mut self, application_type: ApplicationType, documents: &[DocumentType]) -> Self {
        self.required
            .insert(application_type, documents.iter().copied().collect());
        self
    }

    pub fn required_for(&self, application_type: ApplicationType) -> BTreeSet<DocumentType> {
        self.required
            .get(&application_type)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for DocumentRequirements {
    fn default() -> Self {
        Self::new(BTreeMap::new())
            .with(
                ApplicationType::Property,
                &[
                    DocumentType::ApplicationForm,
                    DocumentType::IdProof,
                    DocumentType::OwnershipProof,
                ],
            )
            .with(
                ApplicationType::WaterConnection,
                &[
                    DocumentType::ApplicationForm,
                    DocumentType::IdProof,
                    DocumentType::AddressProof,
                ],
            )
            .with(
                ApplicationType::ShopRegistration,
                &[
                    DocumentType::ApplicationForm,
                    DocumentType::IdProof,
                    DocumentType::AddressProof,
                    DocumentType::OwnershipProof,
                ],
            )
    }
}

/// Presence-only containment check; document contents are never inspected.
#[derive(Debug, Clone, Default)]
pub struct DocumentRequirementChecker {
    requirements: DocumentRequirements,
}

impl DocumentRequirementChecker {
    pub fn new(requirements: DocumentRequirements) -> Self {
        Self { requirements }
    }

    pub fn requirements(&self) -> &DocumentRequirements {
        &self.requirements
    }

    pub fn is_satisfied(
        &self,
        application_type: ApplicationType,
        documents: &[DocumentAttachment],
    ) -> bool {
        self.missing(application_type, documents).is_empty()
    }

    /// Mandatory types not yet attached, in a stable order.
    pub fn missing(
        &self,
        application_type: ApplicationType,
        documents: &[DocumentAttachment],
    ) -> Vec<DocumentType> {
        let attached: BTreeSet<DocumentType> = documents
            .iter()
            .map(|document| document.document_type)
            .collect();

        self.requirements
            .required_for(application_type)
            .difference(&attached)
            .copied()
            .collect()
    }
}
