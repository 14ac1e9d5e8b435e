use serde::{Deserialize, Serialize};

use tf_provider::schema::{Attribute, AttributeConstraint, AttributeType, Block, Description, Schema};
use tf_provider::value::{self, Value, ValueSet, ValueString};
use tf_provider::map;

use crate::timeouts::StateTimeouts;
use crate::utils::WithSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ImageShareState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub source_image_id: ValueString<'a>,
    pub target_project_ids: ValueSet<ValueString<'a>>,
    #[serde(with = "value::serde_as_vec")]
    pub timeouts: Value<StateTimeouts<'a>>,
}

impl<'a> WithSchema for ImageShareState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("ID of the shared image"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "region" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Region of the image, defaults to the provider region"),
                        constraint: AttributeConstraint::OptionalComputed,
                        ..Default::default()
                    },
                    "source_image_id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("ID of the image to share"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "target_project_ids" => Attribute {
                        attr_type: AttributeType::Set(AttributeType::String.into()),
                        description: Description::plain("Projects the image is shared with"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                },
                blocks: map! {
                    "timeouts" => StateTimeouts::block(),
                },
                description: Description::plain("Share a private image with other projects"),
                ..Default::default()
            },
        }
    }
}
