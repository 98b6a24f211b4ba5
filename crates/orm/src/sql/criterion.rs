//! Rendering of criteria restrictions into WHERE-clause text

use crate::criteria::{AssociationCriteria, Criterion, Operator, Order};
use crate::error::{OrmError, OrmResult};
use crate::model::{FieldType, Value};
use crate::policy::EntityDescriptor;
use crate::relationships::Relationship;

use super::SqlBuilder;

/// Renders criterions against the columns of one entity
pub(crate) struct CriterionRenderer<'a> {
    builder: &'a SqlBuilder,
    descriptor: &'a EntityDescriptor,
}

impl<'a> CriterionRenderer<'a> {
    pub(crate) fn new(builder: &'a SqlBuilder, descriptor: &'a EntityDescriptor) -> Self {
        Self {
            builder,
            descriptor,
        }
    }

    /// Column and value type a criteria field refers to
    fn column(&self, field: &str) -> OrmResult<(String, FieldType)> {
        let descriptor = self.descriptor.require_field(field)?;
        if let Some(field_type) = descriptor.field_type() {
            return Ok((descriptor.column.clone(), field_type));
        }

        match descriptor.relationship() {
            Some(relationship) if relationship.is_owning_side() => {
                let referenced = relationship
                    .opposite(self.descriptor.entity)
                    .unwrap_or(self.descriptor.entity);
                let key_type = self
                    .builder
                    .policy()
                    .descriptor(referenced)?
                    .primary_key_type();
                Ok((descriptor.column.clone(), key_type))
            }
            _ => Err(OrmError::invalid_argument(format!(
                "{}.{} has no column on this table; use an association criteria",
                self.descriptor.entity, field
            ))),
        }
    }

    fn operand(column: &str, ignore_case: bool) -> String {
        if ignore_case {
            format!("lower({})", column)
        } else {
            column.to_string()
        }
    }

    fn literal(&self, field_type: FieldType, value: &Value, ignore_case: bool) -> OrmResult<String> {
        let literal = self.builder.literal(field_type, value)?;
        Ok(if ignore_case && !value.is_null() {
            format!("lower({})", literal)
        } else {
            literal
        })
    }

    pub(crate) fn render(&self, criterion: &Criterion) -> OrmResult<String> {
        Ok(match criterion {
            Criterion::Compare {
                field,
                operator,
                value,
                ignore_case,
            } => {
                let (column, field_type) = self.column(field)?;
                match (operator, value.is_null()) {
                    (Operator::Equal, true) => format!("{} IS NULL", column),
                    (Operator::NotEqual, true) => format!("{} IS NOT NULL", column),
                    _ => format!(
                        "{} {} {}",
                        Self::operand(&column, *ignore_case),
                        operator,
                        self.literal(field_type, value, *ignore_case)?
                    ),
                }
            }
            Criterion::Between {
                field,
                low,
                high,
                ignore_case,
            } => {
                let (column, field_type) = self.column(field)?;
                format!(
                    "{} BETWEEN {} AND {}",
                    Self::operand(&column, *ignore_case),
                    self.literal(field_type, low, *ignore_case)?,
                    self.literal(field_type, high, *ignore_case)?
                )
            }
            Criterion::In {
                field,
                values,
                ignore_case,
            } => {
                let (column, field_type) = self.column(field)?;
                let values = values
                    .iter()
                    .map(|v| self.literal(field_type, v, *ignore_case))
                    .collect::<OrmResult<Vec<_>>>()?;
                format!(
                    "{} IN ({})",
                    Self::operand(&column, *ignore_case),
                    values.join(", ")
                )
            }
            Criterion::IsNull { field } => format!("{} IS NULL", self.column(field)?.0),
            Criterion::NotNull { field } => format!("{} IS NOT NULL", self.column(field)?.0),
            Criterion::And(lhs, rhs) => {
                format!("({}) AND ({})", self.render(lhs)?, self.render(rhs)?)
            }
            Criterion::Or(lhs, rhs) => {
                format!("({}) OR ({})", self.render(lhs)?, self.render(rhs)?)
            }
            Criterion::Not(inner) => format!("NOT ({})", self.render(inner)?),
        })
    }

    /// Criterions and associations joined into one conjunction
    pub(crate) fn render_all(
        &self,
        criterions: &[Criterion],
        associations: &[AssociationCriteria],
    ) -> OrmResult<String> {
        let wrap = criterions.len() + associations.len() > 1;
        let mut parts = Vec::with_capacity(criterions.len() + associations.len());
        for criterion in criterions {
            let rendered = self.render(criterion)?;
            parts.push(if wrap && criterion.is_junction() {
                format!("({})", rendered)
            } else {
                rendered
            });
        }
        for association in associations {
            parts.push(self.render_association(association)?);
        }
        Ok(parts.join(" AND "))
    }

    /// Restrict to rows related to at least one matching associated row
    fn render_association(&self, association: &AssociationCriteria) -> OrmResult<String> {
        let entity = self.descriptor.entity;
        let field = self.descriptor.require_field(&association.field)?;
        let relationship = field.relationship().ok_or_else(|| {
            OrmError::invalid_argument(format!(
                "{}.{} is not a relationship",
                entity, association.field
            ))
        })?;
        let target = relationship.opposite(entity).unwrap_or(entity);
        let policy = self.builder.policy();
        let target_descriptor = policy.descriptor(target)?;

        let inner = CriterionRenderer::new(self.builder, &target_descriptor);
        let restriction = inner.render_all(&association.criterions, &association.associations)?;
        let filter = |column: &str| {
            let mut sql = format!("SELECT {} FROM {}", column, target_descriptor.table);
            if !restriction.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&restriction);
            }
            sql
        };

        let own_key = &self.descriptor.primary_key().column;
        let target_key = &target_descriptor.primary_key().column;
        Ok(match relationship {
            Relationship::ManyToMany(r) => {
                let (own, other) = r.columns_from(entity).ok_or_else(|| {
                    OrmError::invalid_argument(format!("{} is not part of {}", entity, r.name))
                })?;
                format!(
                    "{} IN (SELECT {} FROM {} WHERE {} IN ({}))",
                    own_key,
                    own,
                    r.join_table,
                    other,
                    filter(target_key)
                )
            }
            other => {
                let column = other.foreign_key_column().unwrap_or_default();
                if other.is_owning_side() {
                    format!("{} IN ({})", column, filter(target_key))
                } else {
                    format!("{} IN ({})", own_key, filter(column))
                }
            }
        })
    }

    pub(crate) fn render_order(&self, order: &Order) -> OrmResult<String> {
        let (column, _) = self.column(&order.field)?;
        Ok(format!(
            "{} {}",
            Self::operand(&column, order.ignore_case),
            order.direction
        ))
    }
}
