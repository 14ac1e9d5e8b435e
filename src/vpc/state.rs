use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use tf_provider::schema::{Attribute, AttributeConstraint, AttributeType, Block, Description, Schema};
use tf_provider::value::{Value, ValueNumber, ValueSet, ValueString};
use tf_provider::{map, Diagnostics};

use crate::utils::{unknown_if_null, WithNormalize, WithSchema};

use super::api::AddressGroup;

pub const DEFAULT_IP_VERSION: i64 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AddressGroupState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub name: ValueString<'a>,
    pub addresses: ValueSet<ValueString<'a>>,
    pub ip_version: ValueNumber,
    pub description: ValueString<'a>,
}

impl<'a> WithSchema for AddressGroupState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("ID of the address group"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "region" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Region of the address group, defaults to the provider region"),
                        constraint: AttributeConstraint::OptionalComputed,
                        ..Default::default()
                    },
                    "name" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Name of the address group"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "addresses" => Attribute {
                        attr_type: AttributeType::Set(AttributeType::String.into()),
                        description: Description::plain("IP addresses, ranges or CIDR blocks of the group (at most 20)"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "ip_version" => Attribute {
                        attr_type: AttributeType::Number,
                        description: Description::plain("IP version of the addresses: 4 (default) or 6"),
                        constraint: AttributeConstraint::OptionalComputed,
                        ..Default::default()
                    },
                    "description" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Description of the address group"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                },
                description: Description::plain("VPC address group"),
                ..Default::default()
            },
        }
    }
}

impl<'a> WithNormalize for AddressGroupState<'a> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        unknown_if_null(&mut self.id);
        if self.ip_version.is_null() {
            self.ip_version = Value::Value(DEFAULT_IP_VERSION);
        }
    }
}

impl<'a> AddressGroupState<'a> {
    /// Copy the remote attributes into the state
    pub(super) fn apply(&mut self, region: &str, group: AddressGroup) {
        self.id = Value::Value(Cow::Owned(group.id));
        self.region = Value::Value(Cow::Owned(region.to_string()));
        self.name = Value::Value(Cow::Owned(group.name));
        self.addresses = Value::Value(
            group
                .ip_set
                .into_iter()
                .map(|address| Value::Value(Cow::Owned(address)))
                .collect(),
        );
        self.ip_version = Value::Value(group.ip_version);
        // An empty description is reported for groups created without one
        self.description = if group.description.is_empty() && self.description.is_null() {
            Value::Null
        } else {
            Value::Value(Cow::Owned(group.description))
        };
    }
}
