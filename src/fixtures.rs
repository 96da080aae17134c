//! Deterministic fixture datasets
//!
//! Served by the `fixture` data source, and by `fallback` when the live
//! backend is unreachable or answers with an unusable shape. Values are
//! literal so demos and tests render identically every time.

use chrono::{DateTime, NaiveDate, Utc};

use branchdesk_protocol::common::{
    Course, DataOrigin, PaymentStats, Program, RecordId, RecordStatus, StatsSummary,
    Transaction, TransactionStatus,
};

fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .map(|naive| naive.and_utc())
}

fn transaction(
    id: &str,
    user_name: &str,
    user_email: &str,
    course_title: &str,
    amount: i64,
    status: TransactionStatus,
    created_at: Option<DateTime<Utc>>,
) -> Transaction {
    Transaction {
        id: RecordId::new(id),
        user_name: user_name.to_string(),
        user_email: user_email.to_string(),
        course_title: course_title.to_string(),
        amount,
        status,
        created_at,
    }
}

/// Payment dashboard fixture: 8 transactions and fixed headline stats.
/// The stats describe the whole (fictional) ledger, not just these 8 rows.
pub fn payment_stats() -> PaymentStats {
    use TransactionStatus::{Completed, Failed, Pending};

    let transactions = vec![
        transaction(
            "TXN001",
            "Aarav Sharma",
            "aarav.sharma@example.com",
            "B.Sc Computer Science",
            45000,
            Completed,
            at(2024, 1, 15, 10, 30),
        ),
        transaction(
            "TXN002",
            "Priya Patel",
            "priya.patel@example.com",
            "BBA Foundation",
            32000,
            Completed,
            at(2024, 1, 14, 14, 5),
        ),
        transaction(
            "TXN003",
            "Rohan Verma",
            "rohan.verma@example.com",
            "Class 12 Physics",
            8500,
            Pending,
            at(2024, 1, 14, 9, 45),
        ),
        transaction(
            "TXN004",
            "Sneha Iyer",
            "sneha.iyer@example.com",
            "JEE Crash Course",
            15000,
            Completed,
            at(2024, 1, 13, 16, 20),
        ),
        transaction(
            "TXN005",
            "Karan Mehta",
            "karan.mehta@example.com",
            "B.Com Accounting",
            28000,
            Failed,
            at(2024, 1, 12, 11, 0),
        ),
        transaction(
            "TXN006",
            "Ananya Gupta",
            "ananya.gupta@example.com",
            "Spoken English",
            0,
            Completed,
            at(2024, 1, 12, 8, 15),
        ),
        transaction(
            "TXN007",
            "Vikram Singh",
            "vikram.singh@example.com",
            "Class 10 Mathematics",
            6500,
            Pending,
            at(2024, 1, 11, 18, 40),
        ),
        transaction(
            "TXN008",
            "Meera Nair",
            "meera.nair@example.com",
            "MBA Entrance Prep",
            22000,
            Completed,
            at(2024, 1, 10, 12, 10),
        ),
    ];

    PaymentStats {
        stats: StatsSummary {
            total_transactions: 156,
            total_revenue: 2_845_000,
            completed_transactions: 134,
            pending_transactions: 15,
            failed_transactions: 7,
            average_transaction_value: 21_231,
        },
        transactions,
        origin: DataOrigin::Fixture,
    }
}

fn program(id: &str, name: &str) -> Program {
    Program {
        id: RecordId::new(id),
        name: name.to_string(),
        status: RecordStatus::Active,
    }
}

fn course(id: &str, name: &str, program_id: &str) -> Course {
    Course {
        id: RecordId::new(id),
        name: name.to_string(),
        status: RecordStatus::Active,
        program_id: Some(RecordId::new(program_id)),
    }
}

pub fn programs() -> Vec<Program> {
    vec![
        program("1", "UNIVERSITY COURSES"),
        program("2", "SCHOOL COURSES"),
        program("3", "COMPETITIVE EXAMS"),
        program("4", "SKILL DEVELOPMENT"),
    ]
}

fn all_courses() -> Vec<Course> {
    vec![
        course("101", "B.Sc Computer Science", "1"),
        course("102", "B.Com Accounting", "1"),
        course("103", "BBA Foundation", "1"),
        course("201", "Class 10 Mathematics", "2"),
        course("202", "Class 12 Physics", "2"),
        course("301", "JEE Crash Course", "3"),
        course("302", "MBA Entrance Prep", "3"),
        course("401", "Spoken English", "4"),
    ]
}

/// Fixture courses belonging to `program_id`
pub fn courses(program_id: &RecordId) -> Vec<Course> {
    all_courses()
        .into_iter()
        .filter(|c| c.program_id.as_ref() == Some(program_id))
        .collect()
}
