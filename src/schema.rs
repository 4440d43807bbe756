//! Reference DDL for the hospital database. Shown on the queries, triggers and
//! transactions pages and, when enabled, applied at startup.

use crate::error::AppError;
use sqlx::PgPool;

pub const SCHEMA_SQL: &str = r#"-- Hospital Management System Database Schema

-- 1. Departments
CREATE TABLE IF NOT EXISTS departments (
    department_id SERIAL PRIMARY KEY,
    department_name VARCHAR(100) NOT NULL UNIQUE
);

-- 2. Patients
CREATE TABLE IF NOT EXISTS patients (
    patient_id SERIAL PRIMARY KEY,
    name VARCHAR(100) NOT NULL,
    age INTEGER CHECK (age > 0 AND age < 150),
    gender VARCHAR(10),
    address TEXT,
    contact_no VARCHAR(15) NOT NULL
);

-- 3. Doctors
CREATE TABLE IF NOT EXISTS doctors (
    doctor_id SERIAL PRIMARY KEY,
    doctor_name VARCHAR(100) NOT NULL,
    specialization VARCHAR(100),
    consultation_fee DECIMAL(10,2) CHECK (consultation_fee > 0),
    availability VARCHAR(100),
    department_id INTEGER REFERENCES departments(department_id) ON DELETE SET NULL
);

-- 4. Appointments
CREATE TABLE IF NOT EXISTS appointments (
    appointment_id SERIAL PRIMARY KEY,
    date DATE NOT NULL,
    timeslot TIME NOT NULL,
    status VARCHAR(20) DEFAULT 'scheduled' CHECK (status IN ('scheduled', 'completed', 'cancelled')),
    diagnosis TEXT,
    patient_id INTEGER NOT NULL REFERENCES patients(patient_id) ON DELETE CASCADE,
    doctor_id INTEGER NOT NULL REFERENCES doctors(doctor_id) ON DELETE CASCADE
);

-- 5. Medicines
CREATE TABLE IF NOT EXISTS medicines (
    medicine_id SERIAL PRIMARY KEY,
    medicine_name VARCHAR(100) NOT NULL,
    category VARCHAR(50),
    manufacturer VARCHAR(100),
    price_per_unit DECIMAL(10,2) CHECK (price_per_unit > 0),
    stock_quantity INTEGER DEFAULT 0 CHECK (stock_quantity >= 0)
);

-- 6. Prescriptions
CREATE TABLE IF NOT EXISTS prescriptions (
    prescription_id SERIAL PRIMARY KEY,
    appointment_id INTEGER NOT NULL REFERENCES appointments(appointment_id) ON DELETE CASCADE,
    medicine_id INTEGER NOT NULL REFERENCES medicines(medicine_id) ON DELETE CASCADE,
    dosage VARCHAR(100),
    duration VARCHAR(50)
);

-- 7. Vendors
CREATE TABLE IF NOT EXISTS vendors (
    vendor_id SERIAL PRIMARY KEY,
    vendor_name VARCHAR(100) NOT NULL,
    license_no VARCHAR(50) UNIQUE NOT NULL,
    contact_details TEXT
);

-- 8. Supplies
CREATE TABLE IF NOT EXISTS supplies (
    supply_id SERIAL PRIMARY KEY,
    vendor_id INTEGER NOT NULL REFERENCES vendors(vendor_id) ON DELETE CASCADE,
    medicine_id INTEGER NOT NULL REFERENCES medicines(medicine_id) ON DELETE CASCADE,
    quantity_supplied INTEGER CHECK (quantity_supplied > 0),
    purchase_cost DECIMAL(10,2),
    supply_date DATE NOT NULL
);

-- 9. Bills
CREATE TABLE IF NOT EXISTS bills (
    bill_id SERIAL PRIMARY KEY,
    consultant_charge DECIMAL(10,2) DEFAULT 0,
    medicine_charge DECIMAL(10,2) DEFAULT 0,
    total_amount DECIMAL(10,2),
    bill_date DATE NOT NULL,
    appointment_id INTEGER UNIQUE NOT NULL REFERENCES appointments(appointment_id) ON DELETE CASCADE
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_appointments_date ON appointments(date);
CREATE INDEX IF NOT EXISTS idx_appointments_patient ON appointments(patient_id);
CREATE INDEX IF NOT EXISTS idx_appointments_doctor ON appointments(doctor_id);
CREATE INDEX IF NOT EXISTS idx_medicines_category ON medicines(category);
CREATE INDEX IF NOT EXISTS idx_supplies_date ON supplies(supply_date);
"#;

/// Decrements stock by one for every prescription written.
pub const STOCK_TRIGGER_SQL: &str = r#"CREATE OR REPLACE FUNCTION update_medicine_stock()
RETURNS TRIGGER AS $$
BEGIN
    UPDATE medicines
    SET stock_quantity = stock_quantity - 1
    WHERE medicine_id = NEW.medicine_id;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

DROP TRIGGER IF EXISTS trg_prescription_insert ON prescriptions;
CREATE TRIGGER trg_prescription_insert
AFTER INSERT ON prescriptions
FOR EACH ROW
EXECUTE FUNCTION update_medicine_stock();
"#;

/// total_amount = consultant_charge + medicine_charge on every bill write.
pub const BILL_TRIGGER_SQL: &str = r#"CREATE OR REPLACE FUNCTION calculate_bill_total()
RETURNS TRIGGER AS $$
BEGIN
    NEW.total_amount := NEW.consultant_charge + NEW.medicine_charge;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

DROP TRIGGER IF EXISTS trg_bill_calculate ON bills;
CREATE TRIGGER trg_bill_calculate
BEFORE INSERT OR UPDATE ON bills
FOR EACH ROW
EXECUTE FUNCTION calculate_bill_total();
"#;

pub const APPOINTMENT_FLOW_SQL: &str = r#"BEGIN;

-- Step 1: Create appointment
INSERT INTO appointments (date, timeslot, status, patient_id, doctor_id)
VALUES (CURRENT_DATE, '10:00', 'completed', 1, 1);

-- Step 2: Add prescription (linked to appointment)
INSERT INTO prescriptions (appointment_id, medicine_id, dosage, duration)
VALUES (lastval(), 1, '500mg twice daily', '7 days');

-- Step 3: Generate bill
INSERT INTO bills (appointment_id, consultant_charge, medicine_charge, bill_date)
VALUES (lastval(), 1000, 250, CURRENT_DATE);

COMMIT;"#;

pub const ROLLBACK_SQL: &str = r#"BEGIN;

-- Succeeds
INSERT INTO appointments (date, timeslot, status, patient_id, doctor_id)
VALUES (CURRENT_DATE, '11:00', 'scheduled', 1, 1);

-- Fails: patient 9999 does not exist
INSERT INTO appointments (date, timeslot, status, patient_id, doctor_id)
VALUES (CURRENT_DATE, '12:00', 'scheduled', 9999, 1);

ROLLBACK;"#;

pub const RESTOCK_SQL: &str = r#"BEGIN;

-- Lock the row against concurrent updates
SELECT stock_quantity FROM medicines WHERE medicine_id = 1 FOR UPDATE;

UPDATE medicines SET stock_quantity = stock_quantity + 50 WHERE medicine_id = 1;

COMMIT;"#;

pub const FULL_TRANSACTION_SQL: &str = r#"DO $$
DECLARE
    new_apt_id INTEGER;
BEGIN
    INSERT INTO appointments (date, timeslot, status, patient_id, doctor_id)
    VALUES (CURRENT_DATE, '14:00', 'completed', 1, 1)
    RETURNING appointment_id INTO new_apt_id;

    INSERT INTO prescriptions (appointment_id, medicine_id, dosage, duration)
    VALUES (new_apt_id, 1, '500mg twice daily', '7 days');

    INSERT INTO bills (appointment_id, consultant_charge, medicine_charge, bill_date)
    VALUES (new_apt_id, 1000, 250, CURRENT_DATE);

    RAISE NOTICE 'Transaction completed. Appointment ID: %', new_apt_id;
END $$;"#;

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Session `search_path` for connections working in `schema`. Trigger bodies name
/// tables unqualified, so they resolve through this at execution time.
pub fn search_path_sql(schema: &str) -> String {
    format!("SET search_path TO {}, public", quote(schema))
}

/// Create the schema, tables, indexes and triggers in `schema`. Idempotent; runs in one
/// transaction so a failure leaves nothing half-applied.
pub async fn apply_schema(pool: &PgPool, schema: &str) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;
    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quote(schema)))
        .execute(&mut *tx)
        .await?;
    sqlx::query(&format!("SET LOCAL search_path TO {}, public", quote(schema)))
        .execute(&mut *tx)
        .await?;
    for (name, sql) in [
        ("tables", SCHEMA_SQL),
        ("stock trigger", STOCK_TRIGGER_SQL),
        ("bill trigger", BILL_TRIGGER_SQL),
    ] {
        tracing::debug!(step = name, "applying schema");
        sqlx::raw_sql(sql).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    tracing::info!(schema = %schema, "schema applied");
    Ok(())
}
