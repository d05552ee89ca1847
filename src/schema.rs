// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Removal of the attribution is not allowed, as covered under the AGPL license

// Table mappings for the `gtfs` schema. The tables themselves are created by
// the external migrations; a feed reload only truncates and refills them.

pub mod gtfs {
    diesel::table! {
        gtfs.agencies (agency_name) {
            agency_name -> Text,
            agency_url -> Text,
            agency_timezone -> Text,
            agency_lang -> Nullable<Text>,
            agency_phone -> Nullable<Text>,
        }
    }

    diesel::table! {
        gtfs.routes (route_id) {
            route_id -> Text,
            short_name -> Nullable<Text>,
            long_name -> Nullable<Text>,
            gtfs_desc -> Nullable<Text>,
            route_type -> Int2,
            url -> Nullable<Text>,
        }
    }

    diesel::table! {
        gtfs.trips (trip_id) {
            trip_id -> Text,
            route_id -> Text,
            service_id -> Text,
            trip_headsign -> Nullable<Text>,
            direction_id -> Nullable<Int2>,
            block_id -> Nullable<Text>,
            shape_id -> Nullable<Text>,
        }
    }

    diesel::table! {
        gtfs.calendar (service_id) {
            service_id -> Text,
            monday -> Bool,
            tuesday -> Bool,
            wednesday -> Bool,
            thursday -> Bool,
            friday -> Bool,
            saturday -> Bool,
            sunday -> Bool,
            gtfs_start_date -> Date,
            gtfs_end_date -> Date,
        }
    }

    diesel::table! {
        gtfs.calendar_dates (service_id, gtfs_date) {
            service_id -> Text,
            gtfs_date -> Date,
            exception_type -> Int2,
        }
    }

    diesel::table! {
        gtfs.shapes (shape_id, shape_pt_sequence) {
            shape_id -> Text,
            shape_pt_lat -> Float8,
            shape_pt_lon -> Float8,
            shape_pt_sequence -> Int4,
        }
    }

    diesel::table! {
        gtfs.stoptimes (trip_id, stop_sequence) {
            trip_id -> Text,
            arrival_time -> Text,
            departure_time -> Text,
            stop_id -> Text,
            stop_sequence -> Int4,
            pickup_type -> Nullable<Int2>,
            drop_off_type -> Nullable<Int2>,
        }
    }

    diesel::table! {
        gtfs.stops (stop_id) {
            stop_id -> Text,
            stop_code -> Nullable<Text>,
            stop_name -> Text,
            stop_desc -> Nullable<Text>,
            stop_lat -> Float8,
            stop_lon -> Float8,
            zone_id -> Nullable<Text>,
            stop_url -> Nullable<Text>,
            location_type -> Nullable<Int2>,
        }
    }

    diesel::allow_tables_to_appear_in_same_query!(
        agencies,
        calendar,
        calendar_dates,
        routes,
        shapes,
        stops,
        stoptimes,
        trips,
    );
}
