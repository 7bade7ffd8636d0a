//! Diesel schema for scheduling persistence.

diesel::table! {
    /// Deployment definitions read by the scheduler.
    deployments (id) {
        /// Deployment identifier.
        id -> Uuid,
        /// Deployment name, unique per flow.
        #[max_length = 255]
        name -> Varchar,
        /// Owning flow identifier.
        flow_id -> Uuid,
        /// Serialized schedule definition.
        schedule -> Nullable<Jsonb>,
        /// Whether the schedule may produce runs.
        is_schedule_active -> Bool,
        /// Deployment tags as a JSON array of strings.
        tags -> Jsonb,
        /// Parameters passed to each run.
        parameters -> Jsonb,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Flow run records.
    flow_runs (id) {
        /// Run identifier.
        id -> Uuid,
        /// Owning flow identifier.
        flow_id -> Uuid,
        /// Source deployment, if any.
        deployment_id -> Nullable<Uuid>,
        /// Deduplication key, unique per flow.
        #[max_length = 255]
        idempotency_key -> Varchar,
        /// Run parameters.
        parameters -> Jsonb,
        /// Run tags as a JSON array of strings.
        tags -> Jsonb,
        /// Whether the scheduler created the run.
        auto_scheduled -> Bool,
        /// Expected start time.
        expected_start_time -> Nullable<Timestamptz>,
        /// Next scheduled start time.
        next_scheduled_start_time -> Nullable<Timestamptz>,
        /// Current state pointer.
        state_id -> Nullable<Uuid>,
        /// Current state kind.
        #[max_length = 50]
        state_type -> Nullable<Varchar>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Flow run lifecycle states.
    flow_run_states (id) {
        /// State identifier.
        id -> Uuid,
        /// Run the state belongs to.
        flow_run_id -> Uuid,
        /// State kind.
        #[max_length = 50]
        #[sql_name = "type"]
        state_type -> Varchar,
        /// Display name.
        #[max_length = 255]
        name -> Varchar,
        /// Optional message.
        message -> Nullable<Text>,
        /// When the state was entered.
        timestamp -> Timestamptz,
        /// Scheduled time for scheduled states.
        scheduled_time -> Nullable<Timestamptz>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(deployments, flow_runs, flow_run_states);
