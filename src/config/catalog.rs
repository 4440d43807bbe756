//! The hospital tables: columns, relations and forms for every page that edits data.

use crate::config::types::*;

/// Stock levels strictly below this render with the low-stock marker.
pub const LOW_STOCK_THRESHOLD: i64 = 10;

/// Descriptors in navigation order.
pub fn hospital_tables() -> Vec<TableDescriptor> {
    vec![
        patients(),
        doctors(),
        departments(),
        appointments(),
        medicines(),
        vendors(),
        supplies(),
        prescriptions(),
        bills(),
    ]
}

fn table(name: &str, title: &str, singular: &str, primary_key: &str, ascending: bool) -> TableDescriptor {
    TableDescriptor {
        name: name.to_string(),
        page: name.to_string(),
        title: title.to_string(),
        singular: singular.to_string(),
        primary_key: primary_key.to_string(),
        pk_type: PkType::Int,
        order_by: primary_key.to_string(),
        ascending,
        columns: Vec::new(),
        relations: Vec::new(),
        form: Vec::new(),
    }
}

fn patients() -> TableDescriptor {
    TableDescriptor {
        columns: vec![
            ColumnDescriptor::new("patient_id", "ID"),
            ColumnDescriptor::new("name", "Name"),
            ColumnDescriptor::new("age", "Age"),
            ColumnDescriptor::new("gender", "Gender"),
            ColumnDescriptor::new("address", "Address"),
            ColumnDescriptor::new("contact_no", "Contact"),
        ],
        form: vec![
            FormField::new("name", "Name", InputKind::Text).required(),
            FormField::new("age", "Age", InputKind::Integer).required(),
            FormField::new(
                "gender",
                "Gender",
                select(&[("Male", "Male"), ("Female", "Female"), ("Other", "Other")]),
            ),
            FormField::new("contact_no", "Contact", InputKind::Text).required(),
            FormField::new("address", "Address", InputKind::TextArea),
        ],
        ..table("patients", "Patients", "Patient", "patient_id", true)
    }
}

fn doctors() -> TableDescriptor {
    TableDescriptor {
        columns: vec![
            ColumnDescriptor::new("doctor_id", "ID"),
            ColumnDescriptor::new("doctor_name", "Name"),
            ColumnDescriptor::new("specialization", "Specialization"),
            ColumnDescriptor::formatted("consultation_fee", "Fee", Format::Currency),
            ColumnDescriptor::new("availability", "Availability"),
            ColumnDescriptor::new("department_name", "Department"),
        ],
        relations: vec![RelationSpec::new("departments", "department_id", "department_id")
            .field("department_name", "department_name")],
        form: vec![
            FormField::new("doctor_name", "Name", InputKind::Text).required(),
            FormField::new("specialization", "Specialization", InputKind::Text).required(),
            FormField::new("consultation_fee", "Consultation Fee", InputKind::Decimal).required(),
            FormField::new("availability", "Availability", InputKind::Text).placeholder("e.g., Mon-Fri 9AM-5PM"),
            FormField::new("department_id", "Department ID", InputKind::Integer),
        ],
        ..table("doctors", "Doctors", "Doctor", "doctor_id", true)
    }
}

fn departments() -> TableDescriptor {
    TableDescriptor {
        columns: vec![
            ColumnDescriptor::new("department_id", "ID"),
            ColumnDescriptor::new("department_name", "Department Name"),
        ],
        form: vec![FormField::new("department_name", "Department Name", InputKind::Text).required()],
        ..table("departments", "Departments", "Department", "department_id", true)
    }
}

fn appointments() -> TableDescriptor {
    TableDescriptor {
        columns: vec![
            ColumnDescriptor::new("appointment_id", "ID"),
            ColumnDescriptor::new("patient_name", "Patient"),
            ColumnDescriptor::new("doctor_name", "Doctor"),
            ColumnDescriptor::new("date", "Date"),
            ColumnDescriptor::new("timeslot", "Time"),
            ColumnDescriptor::formatted("status", "Status", Format::StatusBadge),
            ColumnDescriptor::new("diagnosis", "Diagnosis"),
        ],
        relations: vec![
            RelationSpec::new("patients", "patient_id", "patient_id").field("name", "patient_name"),
            RelationSpec::new("doctors", "doctor_id", "doctor_id").field("doctor_name", "doctor_name"),
        ],
        form: vec![
            FormField::new("patient_id", "Patient ID", InputKind::Integer).required(),
            FormField::new("doctor_id", "Doctor ID", InputKind::Integer).required(),
            FormField::new("date", "Date", InputKind::Date).required(),
            FormField::new("timeslot", "Time Slot", InputKind::Time).required(),
            FormField::new(
                "status",
                "Status",
                select(&[
                    ("scheduled", "Scheduled"),
                    ("completed", "Completed"),
                    ("cancelled", "Cancelled"),
                ]),
            )
            .default_value("scheduled"),
            FormField::new("diagnosis", "Diagnosis", InputKind::Text),
        ],
        ..table("appointments", "Appointments", "Appointment", "appointment_id", false)
    }
}

fn medicines() -> TableDescriptor {
    TableDescriptor {
        columns: vec![
            ColumnDescriptor::new("medicine_id", "ID"),
            ColumnDescriptor::new("medicine_name", "Name"),
            ColumnDescriptor::new("category", "Category"),
            ColumnDescriptor::new("manufacturer", "Manufacturer"),
            ColumnDescriptor::formatted("price_per_unit", "Price", Format::Currency),
            ColumnDescriptor::formatted(
                "stock_quantity",
                "Stock",
                Format::LowStock {
                    threshold: LOW_STOCK_THRESHOLD,
                },
            ),
        ],
        form: vec![
            FormField::new("medicine_name", "Medicine Name", InputKind::Text).required(),
            FormField::new("category", "Category", InputKind::Text),
            FormField::new("manufacturer", "Manufacturer", InputKind::Text),
            FormField::new("price_per_unit", "Price Per Unit", InputKind::Decimal).required(),
            FormField::new("stock_quantity", "Stock Quantity", InputKind::Integer).required(),
        ],
        ..table("medicines", "Medicines", "Medicine", "medicine_id", true)
    }
}

fn vendors() -> TableDescriptor {
    TableDescriptor {
        columns: vec![
            ColumnDescriptor::new("vendor_id", "ID"),
            ColumnDescriptor::new("vendor_name", "Name"),
            ColumnDescriptor::new("license_no", "License No"),
            ColumnDescriptor::new("contact_details", "Contact"),
        ],
        form: vec![
            FormField::new("vendor_name", "Vendor Name", InputKind::Text).required(),
            FormField::new("license_no", "License No", InputKind::Text).required(),
            FormField::new("contact_details", "Contact Details", InputKind::TextArea),
        ],
        ..table("vendors", "Vendors", "Vendor", "vendor_id", true)
    }
}

fn supplies() -> TableDescriptor {
    TableDescriptor {
        columns: vec![
            ColumnDescriptor::new("supply_id", "ID"),
            ColumnDescriptor::new("vendor_name", "Vendor"),
            ColumnDescriptor::new("medicine_name", "Medicine"),
            ColumnDescriptor::new("quantity_supplied", "Quantity"),
            ColumnDescriptor::formatted("purchase_cost", "Cost", Format::Currency),
            ColumnDescriptor::new("supply_date", "Date"),
        ],
        relations: vec![
            RelationSpec::new("vendors", "vendor_id", "vendor_id").field("vendor_name", "vendor_name"),
            RelationSpec::new("medicines", "medicine_id", "medicine_id").field("medicine_name", "medicine_name"),
        ],
        form: vec![
            FormField::new("vendor_id", "Vendor ID", InputKind::Integer).required(),
            FormField::new("medicine_id", "Medicine ID", InputKind::Integer).required(),
            FormField::new("quantity_supplied", "Quantity", InputKind::Integer).required(),
            FormField::new("purchase_cost", "Purchase Cost", InputKind::Decimal).required(),
            FormField::new("supply_date", "Supply Date", InputKind::Date).required(),
        ],
        ..table("supplies", "Supplies", "Supply", "supply_id", false)
    }
}

fn prescriptions() -> TableDescriptor {
    TableDescriptor {
        columns: vec![
            ColumnDescriptor::new("prescription_id", "ID"),
            ColumnDescriptor::new("patient_name", "Patient"),
            ColumnDescriptor::new("medicine_name", "Medicine"),
            ColumnDescriptor::new("dosage", "Dosage"),
            ColumnDescriptor::new("duration", "Duration"),
            ColumnDescriptor::new("date", "Date"),
        ],
        relations: vec![
            RelationSpec::new("appointments", "appointment_id", "appointment_id")
                .field("date", "date")
                .nest(RelationSpec::new("patients", "patient_id", "patient_id").field("name", "patient_name")),
            RelationSpec::new("medicines", "medicine_id", "medicine_id").field("medicine_name", "medicine_name"),
        ],
        form: vec![
            FormField::new("appointment_id", "Appointment ID", InputKind::Integer).required(),
            FormField::new("medicine_id", "Medicine ID", InputKind::Integer).required(),
            FormField::new("dosage", "Dosage", InputKind::Text)
                .required()
                .placeholder("e.g., 500mg twice daily"),
            FormField::new("duration", "Duration", InputKind::Text)
                .required()
                .placeholder("e.g., 7 days"),
        ],
        ..table("prescriptions", "Prescriptions", "Prescription", "prescription_id", false)
    }
}

fn bills() -> TableDescriptor {
    TableDescriptor {
        page: "billing".to_string(),
        columns: vec![
            ColumnDescriptor::new("bill_id", "ID"),
            ColumnDescriptor::new("patient_name", "Patient"),
            ColumnDescriptor::new("doctor_name", "Doctor"),
            ColumnDescriptor::formatted("consultant_charge", "Consult", Format::Currency),
            ColumnDescriptor::formatted("medicine_charge", "Medicine", Format::Currency),
            ColumnDescriptor::formatted("total_amount", "Total", Format::CurrencyStrong),
            ColumnDescriptor::new("bill_date", "Date"),
        ],
        relations: vec![RelationSpec::new("appointments", "appointment_id", "appointment_id")
            .field("date", "apt_date")
            .nest(RelationSpec::new("patients", "patient_id", "patient_id").field("name", "patient_name"))
            .nest(RelationSpec::new("doctors", "doctor_id", "doctor_id").field("doctor_name", "doctor_name"))],
        form: vec![
            FormField::new("appointment_id", "Appointment ID", InputKind::Integer).required(),
            FormField::new("consultant_charge", "Consultant Charge", InputKind::Decimal).required(),
            FormField::new("medicine_charge", "Medicine Charge", InputKind::Decimal).required(),
            FormField::new("total_amount", "Total Amount", InputKind::Decimal).required(),
            FormField::new("bill_date", "Bill Date", InputKind::Date).required(),
        ],
        ..table("bills", "Bills", "Bill", "bill_id", false)
    }
}
