//! Reservation service

use chrono::NaiveDate;

use crate::{
    availability::ReservationCandidate,
    error::{AppError, AppResult},
    models::{
        reservation::{CreateMyReservation, CreateReservation, ReservationDetails, UpdateReservation},
        Reservation, Visibility,
    },
    repository::Repository,
    services::{availability::AvailabilityService, loans::today},
};

#[derive(Clone)]
pub struct ReservationsService {
    repository: Repository,
    availability: AvailabilityService,
}

impl ReservationsService {
    pub fn new(repository: Repository, availability: AvailabilityService) -> Self {
        Self { repository, availability }
    }

    pub async fn list_reservations(&self, visibility: Visibility) -> AppResult<Vec<ReservationDetails>> {
        self.repository.reservations.list(visibility).await
    }

    pub async fn get_reservation(&self, id: i32, visibility: Visibility) -> AppResult<Reservation> {
        let reservation = self.repository.reservations.get_by_id(id).await?;
        if !visibility.permits(reservation.member_id) {
            return Err(AppError::NotFound(format!("Reservation with id {} not found", id)));
        }
        Ok(reservation)
    }

    /// Reserve a book on behalf of any member
    pub async fn create_reservation(&self, request: CreateReservation) -> AppResult<Reservation> {
        let date = request.reservation_date.unwrap_or_else(today);
        self.reserve(request.book_id, request.member_id, date).await
    }

    /// Reserve a book for the caller's own member record
    pub async fn create_my_reservation(&self, member_id: i32, request: CreateMyReservation) -> AppResult<Reservation> {
        let date = request.reservation_date.unwrap_or_else(today);
        self.reserve(request.book_id, member_id, date).await
    }

    async fn reserve(&self, book_id: i32, member_id: i32, date: NaiveDate) -> AppResult<Reservation> {
        self.repository.books.get_by_id(book_id).await?;
        self.repository.members.get_by_id(member_id).await?;

        self.availability
            .can_create_reservation(&ReservationCandidate {
                book_id,
                member_id,
                date,
                editing: None,
            })
            .await?;

        let created = self.repository.reservations.create(book_id, member_id, date).await?;
        tracing::info!(
            reservation_id = created.id,
            book_id,
            member_id,
            %date,
            "Reservation created"
        );
        Ok(created)
    }

    pub async fn update_reservation(&self, id: i32, update: UpdateReservation) -> AppResult<Reservation> {
        let current = self.repository.reservations.get_by_id(id).await?;
        let next = update.apply_to(&current);

        self.availability
            .can_create_reservation(&ReservationCandidate::from_reservation(&next))
            .await?;

        self.repository.reservations.update(id, &update).await
    }

    pub async fn delete_reservation(&self, id: i32) -> AppResult<()> {
        self.repository.reservations.delete(id).await?;
        tracing::info!(reservation_id = id, "Reservation deleted");
        Ok(())
    }

    /// Cancel one of the caller's own reservations
    pub async fn cancel_my_reservation(&self, member_id: i32, id: i32) -> AppResult<()> {
        self.get_reservation(id, Visibility::Member(member_id)).await?;
        self.delete_reservation(id).await
    }
}
