//! Entertainment media intake: title, type, description, a cover image and a media file.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{FileRule, FileSlot, FlowDefinition, IntakeForm};
use crate::errors::Error;
use crate::types::{FileInput, StoredObject};

pub const COVER_IMAGE_MAX_BYTES: u64 = 5 * 1024 * 1024;
pub const MEDIA_FILE_MAX_BYTES: u64 = 20 * 1024 * 1024;

// The cover is not type-checked: the form only hints `image/*` to the file picker.
pub const ENTERTAINMENT_FLOW: FlowDefinition = FlowDefinition {
    name: "entertainment",
    slots: &[
        FileSlot {
            field: "cover_img",
            folder: "covers",
            label: "Cover",
            rule: FileRule {
                max_bytes: COVER_IMAGE_MAX_BYTES,
                require_image: false,
                too_large: "Cover image must be less than 5MB.",
            },
        },
        FileSlot {
            field: "media_file",
            folder: "media",
            label: "Media",
            rule: FileRule {
                max_bytes: MEDIA_FILE_MAX_BYTES,
                require_image: false,
                too_large: "Media file must be less than 20MB.",
            },
        },
    ],
    missing_files: "Please select both cover image and media file.",
    success_message: "Entertainment added successfully!",
};

#[derive(Debug, Clone, Default)]
pub struct EntertainmentForm {
    pub title: String,
    /// Submitted as `type`
    pub kind: String,
    pub description: String,
    pub cover_img: Option<FileInput>,
    pub media_file: Option<FileInput>,
}

/// Row of the `entertainments` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EntertainmentRecord {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub cover_img_url: String,
    pub media_file_url: String,
}

impl IntakeForm for EntertainmentForm {
    type Record = EntertainmentRecord;

    const FLOW: &'static FlowDefinition = &ENTERTAINMENT_FLOW;

    fn files(&self) -> Vec<Option<&FileInput>> {
        vec![self.cover_img.as_ref(), self.media_file.as_ref()]
    }

    fn into_record(self, objects: &[StoredObject]) -> Result<EntertainmentRecord, Error> {
        let [cover, media] = objects else {
            return Err(Error::Internal {
                operation: format!("build entertainment record from {} objects", objects.len()),
            });
        };

        Ok(EntertainmentRecord {
            title: self.title,
            kind: self.kind,
            description: self.description,
            cover_img_url: cover.url.clone(),
            media_file_url: media.url.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::entertainment_form;
    use crate::types::ObjectKey;

    #[test]
    fn test_record_uses_type_column() {
        let objects = [
            StoredObject {
                key: ObjectKey::new("covers/1_cover.png"),
                url: "http://localhost:3001/objects/entertainment_media/covers/1_cover.png".to_string(),
            },
            StoredObject {
                key: ObjectKey::new("media/1_movie.mp4"),
                url: "http://localhost:3001/objects/entertainment_media/media/1_movie.mp4".to_string(),
            },
        ];
        let record = entertainment_form().into_record(&objects).unwrap();

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "Movie");
        assert!(json.get("kind").is_none());
        assert_eq!(json["cover_img_url"], objects[0].url);
        assert_eq!(json["media_file_url"], objects[1].url);
    }
}
