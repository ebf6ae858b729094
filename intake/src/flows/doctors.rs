//! Doctor profile intake: four text fields and a profile picture.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{FileRule, FileSlot, FlowDefinition, IntakeForm};
use crate::errors::Error;
use crate::types::{FileInput, StoredObject};

pub const PROFILE_PICTURE_MAX_BYTES: u64 = 5 * 1024 * 1024;

pub const DOCTOR_FLOW: FlowDefinition = FlowDefinition {
    name: "doctors",
    slots: &[FileSlot {
        field: "profile_picture",
        folder: "profiles",
        label: "Profile picture",
        rule: FileRule {
            max_bytes: PROFILE_PICTURE_MAX_BYTES,
            require_image: true,
            too_large: "Profile picture must be less than 5MB.",
        },
    }],
    missing_files: "Please select a profile picture.",
    success_message: "Doctor details added successfully!",
};

#[derive(Debug, Clone, Default)]
pub struct DoctorForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub category: String,
    pub profile_picture: Option<FileInput>,
}

/// Row of the `doctors` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DoctorRecord {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub category: String,
    /// Public URL of the profile picture
    pub profilepicture: String,
}

impl IntakeForm for DoctorForm {
    type Record = DoctorRecord;

    const FLOW: &'static FlowDefinition = &DOCTOR_FLOW;

    fn files(&self) -> Vec<Option<&FileInput>> {
        vec![self.profile_picture.as_ref()]
    }

    fn into_record(self, objects: &[StoredObject]) -> Result<DoctorRecord, Error> {
        let [picture] = objects else {
            return Err(Error::Internal {
                operation: format!("build doctor record from {} objects", objects.len()),
            });
        };

        Ok(DoctorRecord {
            name: self.name,
            email: self.email,
            phone: self.phone,
            category: self.category,
            profilepicture: picture.url.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::doctor_form;
    use crate::types::ObjectKey;

    #[test]
    fn test_record_serializes_to_table_columns() {
        let record = doctor_form()
            .into_record(&[StoredObject {
                key: ObjectKey::new("profiles/1_photo.png"),
                url: "https://example.supabase.co/storage/v1/object/public/doctor_profiles/profiles/1_photo.png".to_string(),
            }])
            .unwrap();

        let json = serde_json::to_value(&record).unwrap();
        let mut columns: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        columns.sort();
        assert_eq!(columns, vec!["category", "email", "name", "phone", "profilepicture"]);
        assert_eq!(
            json["profilepicture"],
            "https://example.supabase.co/storage/v1/object/public/doctor_profiles/profiles/1_photo.png"
        );
    }

    #[test]
    fn test_record_requires_one_object() {
        assert!(matches!(doctor_form().into_record(&[]), Err(Error::Internal { .. })));
    }
}
