// libs/appointment-cell/src/services/availability.rs
use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{debug, info, instrument, warn};

use shared_database::{EntityStore, Tables};
use shared_models::entities::{AvailabilityId, DoctorAvailability, DoctorId};

use crate::models::{hhmm, AppointmentError, Bookability, SlotChanges, SlotInput, SlotOccupancy};

/// Calendar days, today included, in which slots can be set and booked.
pub const BOOKING_HORIZON_DAYS: i64 = 7;

/// Days after today for which a doctor may still publish availability.
pub const AVAILABILITY_LEAD_DAYS: i64 = 7;

pub fn horizon_end(today: NaiveDate) -> NaiveDate {
    today
        .checked_add_days(Days::new((BOOKING_HORIZON_DAYS - 1) as u64))
        .unwrap_or(NaiveDate::MAX)
}

pub fn availability_end(today: NaiveDate) -> NaiveDate {
    today
        .checked_add_days(Days::new(AVAILABILITY_LEAD_DAYS as u64))
        .unwrap_or(NaiveDate::MAX)
}

pub struct AvailabilityService {
    store: EntityStore,
}

impl AvailabilityService {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }

    /// Validates a booking against the tables and returns the slot that
    /// covers it. Shared by the read-only check and the booking transaction.
    pub fn check(
        tables: &Tables,
        doctor_id: DoctorId,
        date: NaiveDate,
        time: NaiveTime,
        now: NaiveDateTime,
    ) -> Result<AvailabilityId, AppointmentError> {
        let doctor = tables
            .doctor(doctor_id)
            .map_err(|_| AppointmentError::NotFound("Doctor"))?;
        let doctor_active = tables.user(doctor.user_id).map(|u| u.is_active).unwrap_or(false);
        if !doctor_active {
            return Err(AppointmentError::DoctorInactive);
        }

        if date.and_time(time) <= now {
            return Err(AppointmentError::InPast);
        }
        if date > horizon_end(now.date()) {
            return Err(AppointmentError::OutsideHorizon(BOOKING_HORIZON_DAYS));
        }

        let slot = tables
            .slots_for_doctor(doctor_id)
            .filter(|s| s.date == date && s.is_available && s.covers(time))
            .min_by_key(|s| s.start_time)
            .ok_or(AppointmentError::DoctorNotAvailable)?;

        if tables.booked_at(doctor_id, date, time) > 0 {
            return Err(AppointmentError::SlotTaken);
        }

        if tables.booked_in_slot(slot).len() >= slot.max_appointments as usize {
            return Err(AppointmentError::SlotFull);
        }

        Ok(slot.id)
    }

    #[instrument(skip(self))]
    pub async fn is_bookable(
        &self,
        doctor_id: DoctorId,
        date: NaiveDate,
        time: NaiveTime,
        now: NaiveDateTime,
    ) -> Result<Bookability, AppointmentError> {
        let outcome = self
            .store
            .read(|t| Self::check(t, doctor_id, date, time, now))
            .await;

        match outcome {
            Ok(_) => Ok(Bookability::yes()),
            Err(err @ AppointmentError::NotFound(_)) => Err(err),
            Err(reason) => {
                debug!("Doctor {} not bookable at {} {}: {}", doctor_id, date, time, reason);
                Ok(Bookability::no(&reason))
            }
        }
    }

    fn validate_window(input_date: NaiveDate, today: NaiveDate) -> Result<(), AppointmentError> {
        if input_date < today {
            return Err(AppointmentError::AvailabilityInPast);
        }
        if input_date > availability_end(today) {
            return Err(AppointmentError::AvailabilityBeyondHorizon(AVAILABILITY_LEAD_DAYS));
        }
        Ok(())
    }

    /// Creates the slot, or overwrites the one starting at the same time.
    /// Returns the stored slot and whether it was newly created.
    #[instrument(skip(self, input))]
    pub async fn set_availability(
        &self,
        doctor_id: DoctorId,
        input: SlotInput,
        now: NaiveDateTime,
    ) -> Result<(DoctorAvailability, bool), AppointmentError> {
        Self::validate_window(input.date, now.date())?;
        if input.start_time >= input.end_time {
            return Err(AppointmentError::InvalidTimeRange);
        }
        if input.max_appointments == 0 {
            return Err(AppointmentError::InvalidCapacity);
        }

        let (slot, created) = self
            .store
            .transaction(|t| {
                t.doctor(doctor_id).map_err(|_| AppointmentError::NotFound("Doctor"))?;

                match t.slot_starting_at(doctor_id, input.date, input.start_time).map(|s| s.id) {
                    Some(existing) => {
                        let slot = t.update_availability(existing, |s| {
                            s.end_time = input.end_time;
                            s.is_available = input.is_available;
                            s.max_appointments = input.max_appointments;
                        })?;
                        Ok::<_, AppointmentError>((slot, false))
                    }
                    None => {
                        let slot = t.insert_availability(DoctorAvailability {
                            id: 0,
                            doctor_id,
                            date: input.date,
                            start_time: input.start_time,
                            end_time: input.end_time,
                            is_available: input.is_available,
                            max_appointments: input.max_appointments,
                            created_at: now,
                        })?;
                        Ok((slot, true))
                    }
                }
            })
            .await?;

        info!(
            "Doctor {} availability {} for {} {}-{}",
            doctor_id,
            if created { "created" } else { "updated" },
            slot.date,
            hhmm(slot.start_time),
            hhmm(slot.end_time)
        );
        Ok((slot, created))
    }

    #[instrument(skip(self, changes))]
    pub async fn update_slot(
        &self,
        doctor_id: DoctorId,
        slot_id: AvailabilityId,
        changes: SlotChanges,
    ) -> Result<DoctorAvailability, AppointmentError> {
        if changes.max_appointments == Some(0) {
            return Err(AppointmentError::InvalidCapacity);
        }

        self.store
            .transaction(|t| {
                let current = Self::owned_slot(t, doctor_id, slot_id)?;
                let start = changes.start_time.unwrap_or(current.start_time);
                let end = changes.end_time.unwrap_or(current.end_time);
                if start >= end {
                    return Err(AppointmentError::InvalidTimeRange);
                }

                let updated = t.update_availability(slot_id, |s| {
                    s.start_time = start;
                    s.end_time = end;
                    if let Some(is_available) = changes.is_available {
                        s.is_available = is_available;
                    }
                    if let Some(max) = changes.max_appointments {
                        s.max_appointments = max;
                    }
                })?;
                Ok(updated)
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn delete_slot(&self, doctor_id: DoctorId, slot_id: AvailabilityId) -> Result<(), AppointmentError> {
        self.store
            .transaction(|t| {
                let slot = Self::owned_slot(t, doctor_id, slot_id)?;
                if !t.booked_in_slot(&slot).is_empty() {
                    warn!("Refusing to delete slot {} with booked appointments", slot_id);
                    return Err(AppointmentError::SlotHasBookings);
                }
                t.delete_availability(slot_id)?;
                Ok(())
            })
            .await
    }

    fn owned_slot(
        tables: &Tables,
        doctor_id: DoctorId,
        slot_id: AvailabilityId,
    ) -> Result<DoctorAvailability, AppointmentError> {
        let slot = tables
            .availability_slot(slot_id)
            .map_err(|_| AppointmentError::NotFound("Availability slot"))?;
        if slot.doctor_id != doctor_id {
            return Err(AppointmentError::Forbidden("You can only manage your own availability"));
        }
        Ok(slot.clone())
    }

    /// Slots of a doctor from `today` on, with occupancy. `only_available`
    /// hides slots the doctor switched off and stops at the booking horizon;
    /// otherwise every day availability can be set for is listed.
    pub async fn slot_report(
        &self,
        doctor_id: DoctorId,
        today: NaiveDate,
        only_available: bool,
    ) -> Result<Vec<SlotOccupancy>, AppointmentError> {
        self.store
            .read(|t| {
                t.doctor(doctor_id).map_err(|_| AppointmentError::NotFound("Doctor"))?;
                let last_day = if only_available { horizon_end(today) } else { availability_end(today) };

                let mut slots: Vec<&DoctorAvailability> = t
                    .slots_for_doctor(doctor_id)
                    .filter(|s| s.date >= today && s.date <= last_day)
                    .filter(|s| !only_available || s.is_available)
                    .collect();
                slots.sort_by_key(|s| (s.date, s.start_time));

                Ok(slots
                    .into_iter()
                    .map(|slot| {
                        let mut booked: Vec<NaiveTime> = t.booked_in_slot(slot).iter().map(|a| a.time).collect();
                        booked.sort();
                        SlotOccupancy {
                            id: slot.id,
                            date: slot.date,
                            start_time: hhmm(slot.start_time),
                            end_time: hhmm(slot.end_time),
                            is_available: slot.is_available,
                            max_appointments: slot.max_appointments,
                            booked_count: booked.len(),
                            slots_available: booked.len() < slot.max_appointments as usize,
                            occupied_times: booked.into_iter().map(hhmm).collect(),
                        }
                    })
                    .collect())
            })
            .await
    }
}
