use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
};
use chrono::Local;

use crate::model::{AppointmentId, AppointmentPatch, parse_date};

use super::AppState;
use super::dto::*;
use super::error::{ApiError, ApiResult};

const DEFAULT_CANDIDATE_DAYS: usize = 10;

fn bad_request(msg: impl Into<String>) -> ApiError {
    ApiError::BadRequest(msg.into())
}

fn appointment_id(path: Result<Path<AppointmentId>, PathRejection>) -> ApiResult<AppointmentId> {
    path.map(|Path(id)| id)
        .map_err(|_| bad_request("Identificador de agendamento inválido."))
}

/// Non-blank value or `None`.
fn filled(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        active: state.engine.active_count(),
        archived: state.history.len().await,
    })
}

pub async fn list_slots(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(
        state
            .engine
            .catalog()
            .all_slots()
            .iter()
            .map(|s| s.to_string())
            .collect(),
    )
}

pub async fn list_appointments(State(state): State<AppState>) -> Json<Vec<AppointmentDto>> {
    let appointments = state.engine.list().await;
    Json(appointments.into_iter().map(AppointmentDto::from).collect())
}

pub async fn list_services(State(state): State<AppState>) -> Json<Vec<ServiceDto>> {
    Json(
        state
            .engine
            .catalog()
            .services()
            .iter()
            .map(ServiceDto::from)
            .collect(),
    )
}

pub async fn create_appointment(
    State(state): State<AppState>,
    payload: Result<Json<CreateAppointmentRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let Json(req) = payload.map_err(|e| bad_request(e.body_text()))?;

    let (Some(client), Some(date), Some(slot), Some(service), Some(budget)) = (
        filled(req.nome_cliente),
        filled(req.data),
        filled(req.hora),
        filled(req.servico),
        req.valor_orcamento,
    ) else {
        return Err(bad_request("Todos os campos devem ser preenchidos."));
    };

    let appointment = state
        .engine
        .create(&client, &date, &slot, &service, budget)
        .await?;
    tracing::info!(
        id = appointment.id,
        date = %appointment.date,
        slot = %appointment.slot,
        "appointment booked"
    );

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Orçamento cadastrado com sucesso".to_string(),
            id: Some(appointment.id),
        }),
    ))
}

pub async fn update_appointment(
    State(state): State<AppState>,
    path: Result<Path<AppointmentId>, PathRejection>,
    payload: Result<Json<UpdateAppointmentRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let id = appointment_id(path)?;
    let Json(req) = payload.map_err(|e| bad_request(e.body_text()))?;

    let patch = AppointmentPatch {
        client_name: req.nome_cliente,
        service_name: req.servico,
        budget_value: req.valor_orcamento,
    };
    state.engine.update(id, patch).await?;
    Ok(Json(MessageResponse::new("Agendamento atualizado com sucesso!")))
}

pub async fn delete_appointment(
    State(state): State<AppState>,
    path: Result<Path<AppointmentId>, PathRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let id = appointment_id(path)?;
    state.engine.delete(id).await?;
    tracing::info!(id, "appointment cancelled");
    Ok(Json(MessageResponse::new("Agendamento excluído com sucesso!")))
}

pub async fn available_slots(
    State(state): State<AppState>,
    query: Result<Query<AvailabilityQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<String>>> {
    let Query(query) = query.map_err(|e| bad_request(e.body_text()))?;
    let date = query
        .data
        .as_deref()
        .and_then(parse_date)
        .ok_or_else(|| bad_request("Informe a data no formato AAAA-MM-DD."))?;

    let slots = state.engine.available_slots(date).await;
    Ok(Json(slots.iter().map(|s| s.to_string()).collect()))
}

pub async fn candidate_dates(
    State(state): State<AppState>,
    query: Result<Query<CandidateDatesQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<String>>> {
    let Query(query) = query.map_err(|e| bad_request(e.body_text()))?;
    let count = query.dias.unwrap_or(DEFAULT_CANDIDATE_DAYS);

    let dates = state
        .engine
        .candidate_dates(Local::now().date_naive(), count)?;
    Ok(Json(
        dates
            .iter()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .collect(),
    ))
}

pub async fn list_archived(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ArchivedAppointmentDto>>> {
    let records = state.history.list().await?;
    Ok(Json(
        records
            .into_iter()
            .map(ArchivedAppointmentDto::from)
            .collect(),
    ))
}
