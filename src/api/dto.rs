//! Wire shapes. Field names follow the existing client contract.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::Service;
use crate::model::{Appointment, AppointmentId, ArchivedAppointment};

#[derive(Debug, Serialize)]
pub struct AppointmentDto {
    pub id: AppointmentId,
    pub nome_cliente: String,
    pub data: String,
    pub hora: String,
    pub servico: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub valor_orcamento: Decimal,
}

impl From<Appointment> for AppointmentDto {
    fn from(a: Appointment) -> Self {
        Self {
            id: a.id,
            nome_cliente: a.client_name,
            data: a.date.format("%Y-%m-%d").to_string(),
            hora: a.slot.to_string(),
            servico: a.service_name,
            valor_orcamento: a.budget_value,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ArchivedAppointmentDto {
    #[serde(flatten)]
    pub appointment: AppointmentDto,
    pub concluido_em: DateTime<Utc>,
}

impl From<ArchivedAppointment> for ArchivedAppointmentDto {
    fn from(r: ArchivedAppointment) -> Self {
        Self {
            appointment: r.appointment.into(),
            concluido_em: r.archived_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ServiceDto {
    pub nome: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub preco: Decimal,
}

impl From<&Service> for ServiceDto {
    fn from(s: &Service) -> Self {
        Self {
            nome: s.name.clone(),
            preco: s.price,
        }
    }
}

/// Body of `POST /api/cadastro`. Every field is required; presence is
/// checked by the handler so a missing one is a 400, not a decode error.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    pub nome_cliente: Option<String>,
    pub data: Option<String>,
    pub hora: Option<String>,
    pub servico: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub valor_orcamento: Option<Decimal>,
}

/// Body of `PUT /api/agendamentos/:id`.
#[derive(Debug, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub nome_cliente: Option<String>,
    pub servico: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub valor_orcamento: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<AppointmentId>,
}

impl MessageResponse {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            id: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub data: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateDatesQuery {
    pub dias: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub active: usize,
    pub archived: usize,
}
