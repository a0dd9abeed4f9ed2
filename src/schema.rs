// Written by hand to match the tables created in `DbContext::init_schema`.

diesel::table! {
    newspapers (id) {
        id -> Text,
        name -> Text,
        city -> Nullable<Text>,
        country -> Nullable<Text>,
        start_year -> Nullable<Integer>,
        end_year -> Nullable<Integer>,
        description -> Nullable<Text>,
        source_type -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    issues (id) {
        id -> Text,
        newspaper_id -> Text,
        issue_date -> Text,
        num_pages -> Integer,
        source_type -> Text,
        source_external_id -> Nullable<Text>,
        metadata -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    pages (id) {
        id -> Text,
        issue_id -> Text,
        page_number -> Integer,
        image_path -> Text,
        ocr_text -> Nullable<Text>,
        ocr_confidence -> Nullable<Double>,
        ocr_provider -> Nullable<Text>,
        ocr_version -> Nullable<Text>,
        ocr_meta -> Nullable<Text>,
        ingestion_status -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    ingest_jobs (id) {
        id -> Text,
        idempotency_key -> Text,
        issue_id -> Nullable<Text>,
        status -> Text,
        progress -> Text,
        progress_version -> Integer,
        error_message -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::joinable!(issues -> newspapers (newspaper_id));
diesel::joinable!(pages -> issues (issue_id));
diesel::joinable!(ingest_jobs -> issues (issue_id));

diesel::allow_tables_to_appear_in_same_query!(ingest_jobs, issues, newspapers, pages,);
