use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use tf_provider::schema::{Attribute, AttributeConstraint, AttributeType, Block, Description, Schema};
use tf_provider::value::{self, Value, ValueBool, ValueList, ValueNumber, ValueString};
use tf_provider::{map, Diagnostics};

use crate::timeouts::StateTimeouts;
use crate::utils::{unknown_if_null, WithNormalize, WithSchema};

use super::api::Instance;

pub const DEFAULT_CPU_ARCHITECTURE: &str = "x86";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DedicatedInstanceState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub name: ValueString<'a>,
    pub available_zone: ValueString<'a>,
    pub specification_code: ValueString<'a>,
    pub ecs_flavor: ValueString<'a>,
    pub vpc_id: ValueString<'a>,
    pub subnet_id: ValueString<'a>,
    pub cpu_architecture: ValueString<'a>,
    pub security_group: ValueList<ValueString<'a>>,
    pub group_id: ValueString<'a>,
    pub res_tenant: ValueBool,
    pub enterprise_project_id: ValueString<'a>,
    pub server_id: ValueString<'a>,
    pub service_ip: ValueString<'a>,
    pub run_status: ValueNumber,
    pub access_status: ValueNumber,
    pub upgradable: ValueNumber,
    #[serde(with = "value::serde_as_vec")]
    pub timeouts: Value<StateTimeouts<'a>>,
}

fn string(description: &'static str, constraint: AttributeConstraint) -> Attribute {
    Attribute {
        attr_type: AttributeType::String,
        description: Description::plain(description),
        constraint,
        ..Default::default()
    }
}

fn number(description: &'static str) -> Attribute {
    Attribute {
        attr_type: AttributeType::Number,
        description: Description::plain(description),
        constraint: AttributeConstraint::Computed,
        ..Default::default()
    }
}

impl<'a> WithSchema for DedicatedInstanceState<'a> {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, Optional, OptionalComputed, Required};
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => string("ID of the instance", Computed),
                    "region" => string("Region of the instance, defaults to the provider region", OptionalComputed),
                    "name" => string("Name of the instance", Required),
                    "available_zone" => string("Availability zone of the instance", Required),
                    "specification_code" => string("Specification of the instance", Required),
                    "ecs_flavor" => string("ECS flavor backing the instance", Required),
                    "vpc_id" => string("VPC of the instance", Required),
                    "subnet_id" => string("Subnet of the instance", Required),
                    "cpu_architecture" => string("CPU architecture of the instance (default: x86)", OptionalComputed),
                    "security_group" => Attribute {
                        attr_type: AttributeType::List(AttributeType::String.into()),
                        description: Description::plain("Security groups of the instance"),
                        constraint: Required,
                        ..Default::default()
                    },
                    "group_id" => string("Instance group to join", Optional),
                    "res_tenant" => Attribute {
                        attr_type: AttributeType::Bool,
                        description: Description::plain("Create the instance as a resource tenant"),
                        constraint: Optional,
                        ..Default::default()
                    },
                    "enterprise_project_id" => string("Enterprise project of the instance, defaults to the provider one", Optional),
                    "server_id" => string("ID of the ECS hosting the instance", Computed),
                    "service_ip" => string("Service IP address of the instance", Computed),
                    "run_status" => number("Run status of the instance"),
                    "access_status" => number("Access status of the instance"),
                    "upgradable" => number("Whether the instance can be upgraded"),
                },
                blocks: map! {
                    "timeouts" => StateTimeouts::block(),
                },
                description: Description::plain("WAF dedicated instance"),
                ..Default::default()
            },
        }
    }
}

impl<'a> WithNormalize for DedicatedInstanceState<'a> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        if self.cpu_architecture.is_null() {
            self.cpu_architecture = Value::Value(Cow::Borrowed(DEFAULT_CPU_ARCHITECTURE));
        }
    }
}

fn owned<'x>(text: String) -> ValueString<'x> {
    Value::Value(Cow::Owned(text))
}

impl<'a> DedicatedInstanceState<'a> {
    /// Computed attributes become unknown until the instance exists
    pub(super) fn unknown_computed(&mut self) {
        for value in [&mut self.id, &mut self.server_id, &mut self.service_ip] {
            unknown_if_null(value);
        }
        for value in [
            &mut self.run_status,
            &mut self.access_status,
            &mut self.upgradable,
        ] {
            unknown_if_null(value);
        }
    }

    /// Computed attributes that could not be read are left empty
    pub(super) fn null_computed(&mut self) {
        for value in [&mut self.server_id, &mut self.service_ip] {
            if value.is_unknown() {
                *value = Value::Null;
            }
        }
        for value in [
            &mut self.run_status,
            &mut self.access_status,
            &mut self.upgradable,
        ] {
            if value.is_unknown() {
                *value = Value::Null;
            }
        }
    }

    /// Copy the computed attributes of `prior` into the state
    pub(super) fn keep_computed(&mut self, prior: &Self) {
        self.id = prior.id.clone();
        self.server_id = prior.server_id.clone();
        self.service_ip = prior.service_ip.clone();
        self.run_status = prior.run_status;
        self.access_status = prior.access_status;
        self.upgradable = prior.upgradable;
    }

    /// Copy the remote attributes into the state
    pub(super) fn apply(&mut self, region: &str, instance: Instance) {
        self.id = owned(instance.id);
        self.region = owned(if instance.region.is_empty() {
            region.to_string()
        } else {
            instance.region
        });
        self.name = owned(instance.name);
        self.available_zone = owned(instance.zone);
        self.cpu_architecture = owned(instance.arch);
        self.ecs_flavor = owned(instance.cpu_flavor);
        self.vpc_id = owned(instance.vpc_id);
        self.subnet_id = owned(instance.subnet_id);
        self.security_group = Value::Value(
            instance
                .security_group_ids
                .into_iter()
                .map(owned)
                .collect(),
        );
        if !instance.resource_spec_code.is_empty() {
            self.specification_code = owned(instance.resource_spec_code);
        }
        // Instances outside of a group report an empty pool
        if !instance.pool_id.is_empty() || !self.group_id.is_null() {
            self.group_id = owned(instance.pool_id);
        }
        self.server_id = owned(instance.server_id);
        self.service_ip = owned(instance.service_ip);
        self.run_status = Value::Value(instance.run_status);
        self.access_status = Value::Value(instance.access_status);
        self.upgradable = Value::Value(instance.upgradable);
    }
}
