use std::borrow::Cow;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use tf_provider::schema::{Attribute, AttributeConstraint, AttributeType, Block, Description, Schema};
use tf_provider::value::{Value, ValueBool, ValueList, ValueMap, ValueNumber, ValueString};
use tf_provider::map;

use crate::utils::WithSchema;

use super::api::Volume;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VolumesState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub volume_id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub availability_zone: ValueString<'a>,
    pub volume_type_id: ValueString<'a>,
    pub server_id: ValueString<'a>,
    pub status: ValueString<'a>,
    pub enterprise_project_id: ValueString<'a>,
    pub tags: ValueMap<'a, ValueString<'a>>,
    pub volumes: ValueList<Value<VolumeState<'a>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VolumeState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub availability_zone: ValueString<'a>,
    pub description: ValueString<'a>,
    pub size: ValueNumber,
    pub status: ValueString<'a>,
    pub volume_type: ValueString<'a>,
    pub device_type: ValueString<'a>,
    pub bootable: ValueBool,
    pub shareable: ValueBool,
    pub multiattach: ValueBool,
    pub enterprise_project_id: ValueString<'a>,
    pub service_type: ValueString<'a>,
    pub tags: ValueMap<'a, ValueString<'a>>,
    pub attachments: ValueList<Value<AttachmentState<'a>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttachmentState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub instance_id: ValueString<'a>,
    pub device: ValueString<'a>,
}

fn filter(description: &'static str) -> Attribute {
    Attribute {
        attr_type: AttributeType::String,
        description: Description::plain(description),
        constraint: AttributeConstraint::Optional,
        ..Default::default()
    }
}

fn volume_type() -> AttributeType {
    let string_map = || AttributeType::Map(AttributeType::String.into());
    let attachment: HashMap<String, AttributeType> = map! {
        "id" => AttributeType::String,
        "instance_id" => AttributeType::String,
        "device" => AttributeType::String,
    };
    AttributeType::Object(map! {
        "id" => AttributeType::String,
        "name" => AttributeType::String,
        "availability_zone" => AttributeType::String,
        "description" => AttributeType::String,
        "size" => AttributeType::Number,
        "status" => AttributeType::String,
        "volume_type" => AttributeType::String,
        "device_type" => AttributeType::String,
        "bootable" => AttributeType::Bool,
        "shareable" => AttributeType::Bool,
        "multiattach" => AttributeType::Bool,
        "enterprise_project_id" => AttributeType::String,
        "service_type" => AttributeType::String,
        "tags" => string_map(),
        "attachments" => AttributeType::List(AttributeType::Object(attachment).into()),
    })
}

impl<'a> WithSchema for VolumesState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Hash of the IDs of the volumes found"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "region" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Region to query, defaults to the provider region"),
                        constraint: AttributeConstraint::OptionalComputed,
                        ..Default::default()
                    },
                    "volume_id" => filter("ID of the volume"),
                    "name" => filter("Name of the volumes"),
                    "availability_zone" => filter("Availability zone of the volumes"),
                    "volume_type_id" => filter("Type of the volumes"),
                    "server_id" => filter("Server the volumes are attached to"),
                    "status" => filter("Status of the volumes"),
                    "enterprise_project_id" => filter("Enterprise project of the volumes"),
                    "tags" => Attribute {
                        attr_type: AttributeType::Map(AttributeType::String.into()),
                        description: Description::plain("Tags the volumes must carry"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "volumes" => Attribute {
                        attr_type: AttributeType::List(volume_type().into()),
                        description: Description::plain("Volumes matching the filters"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                },
                description: Description::plain("List EVS volumes"),
                ..Default::default()
            },
        }
    }
}

fn owned<'x>(text: String) -> ValueString<'x> {
    Value::Value(Cow::Owned(text))
}

impl<'a> From<Volume> for VolumeState<'a> {
    fn from(volume: Volume) -> Self {
        let device_type = volume.device_type();
        let bootable = volume.is_bootable();
        Self {
            id: owned(volume.id),
            name: owned(volume.name),
            availability_zone: owned(volume.availability_zone),
            description: owned(volume.description),
            size: Value::Value(volume.size),
            status: owned(volume.status),
            volume_type: owned(volume.volume_type),
            device_type: Value::Value(Cow::Borrowed(device_type)),
            bootable: Value::Value(bootable),
            shareable: Value::Value(volume.multiattach),
            multiattach: Value::Value(volume.multiattach),
            enterprise_project_id: owned(volume.enterprise_project_id),
            service_type: owned(volume.service_type),
            tags: Value::Value(
                volume
                    .tags
                    .into_iter()
                    .map(|(key, value)| (Cow::Owned(key), owned(value)))
                    .collect(),
            ),
            attachments: Value::Value(
                volume
                    .attachments
                    .into_iter()
                    .map(|attachment| {
                        Value::Value(AttachmentState {
                            id: owned(attachment.attachment_id),
                            instance_id: owned(attachment.server_id),
                            device: owned(attachment.device),
                        })
                    })
                    .collect(),
            ),
        }
    }
}
